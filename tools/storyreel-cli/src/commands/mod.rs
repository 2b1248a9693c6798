pub mod check;
pub mod export;
pub mod generate;
pub mod panels;
pub mod speech;
pub mod subtitles;
