pub mod traffic_light_controller;
