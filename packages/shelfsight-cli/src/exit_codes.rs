pub const SUCCESS: i32 = 0;
/// Bad input: missing files, malformed result files, invalid parameters.
pub const INPUT_ERROR: i32 = 1;
/// Local failure after the work started (serialization, file writes).
pub const EXECUTION_ERROR: i32 = 2;
/// The analysis service rejected or failed the request.
pub const API_ERROR: i32 = 3;
