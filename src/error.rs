use thiserror::Error;

#[derive(Debug, Error)]
pub enum FoilgenError {
    #[error("Input error: {0}")]
    Input(String),
    #[error("Script error: {0}")]
    Script(String),
    #[error("Solver error: {0}")]
    Solver(String),
    #[error("Parser error: {0}")]
    Parser(String),
    #[error("Output error: {0}")]
    Output(String),
}
