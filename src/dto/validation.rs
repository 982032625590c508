//! Validation helpers for DTOs.

use validator::ValidationError;

/// Largest grid accepted before the configured board sizes are consulted.
pub const MAX_BOARD_SIZE: usize = 16;

/// Validates that a board size is structurally sensible (at least 2, at most [`MAX_BOARD_SIZE`]).
///
/// Whether the size is actually offered is decided against the configuration by the services.
pub fn validate_board_size(size: usize) -> Result<(), ValidationError> {
    if !(2..=MAX_BOARD_SIZE).contains(&size) {
        let mut err = ValidationError::new("board_size_range");
        err.message = Some(
            format!("Board size must be between 2 and {MAX_BOARD_SIZE} (got {size})").into(),
        );
        return Err(err);
    }
    Ok(())
}

/// Validates that a coordinate is not negative.
pub fn validate_coordinate(value: i32) -> Result<(), ValidationError> {
    if value < 0 {
        let mut err = ValidationError::new("coordinate_negative");
        err.message = Some(format!("Coordinates must not be negative (got {value})").into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_board_size_valid() {
        assert!(validate_board_size(3).is_ok());
        assert!(validate_board_size(5).is_ok());
        assert!(validate_board_size(MAX_BOARD_SIZE).is_ok());
    }

    #[test]
    fn test_validate_board_size_invalid() {
        assert!(validate_board_size(0).is_err());
        assert!(validate_board_size(1).is_err());
        assert!(validate_board_size(MAX_BOARD_SIZE + 1).is_err());
    }

    #[test]
    fn test_validate_coordinate() {
        assert!(validate_coordinate(0).is_ok());
        assert!(validate_coordinate(7).is_ok()); // bounds are checked against the board later
        assert!(validate_coordinate(-1).is_err());
    }
}
