pub mod app;
pub mod audio;
pub mod config;
pub mod cover;
pub mod input;
pub mod library;
pub mod model;
pub mod playlist;
pub mod profile;
pub mod theme;
pub mod transport;
pub mod ui;
pub mod visualizer;
