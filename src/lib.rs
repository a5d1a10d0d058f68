pub mod cli;
pub mod quizforge;
