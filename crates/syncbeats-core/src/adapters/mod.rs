pub mod channel;
pub mod headless_player;
pub mod rest;
pub mod room_service;
pub mod ws;
