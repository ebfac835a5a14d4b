pub mod assets;
pub mod config;
pub mod debug;
pub mod gameplay;
pub mod render;
pub mod results;
pub mod states;
pub mod track;
pub mod ui;
