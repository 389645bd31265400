pub mod output;
pub mod terminal;
pub mod text;
