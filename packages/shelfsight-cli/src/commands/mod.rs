use crate::exit_codes;
use shelfsight_client::ClientError;

pub mod analyze;
pub mod info;
pub mod insights;
pub mod qa;
pub mod refine;
pub mod report;

/// Map a client error to the process exit code for its failure class.
pub(crate) fn exit_code_for(err: &ClientError) -> i32 {
    match err {
        ClientError::Io(_) | ClientError::FileNotFound(_) | ClientError::InvalidRequest(_) => {
            exit_codes::INPUT_ERROR
        }
        ClientError::Timeout
        | ClientError::FileTooLarge
        | ClientError::ServerError
        | ClientError::Rejected { .. }
        | ClientError::Status(_)
        | ClientError::Decode(_)
        | ClientError::Transport(_) => exit_codes::API_ERROR,
        _ => exit_codes::EXECUTION_ERROR,
    }
}
