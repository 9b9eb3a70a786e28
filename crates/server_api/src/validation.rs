use shared::error::{FieldError, MessageArg};

pub const MAX_CHARACTERS: usize = 255;

pub fn test_not_empty(value: &str, field: &str, label_key: &str, errors: &mut Vec<FieldError>) {
    if value.trim().is_empty() {
        errors.push(FieldError::field(
            field,
            "validation.message.notEmpty",
            vec![MessageArg::localized(label_key)],
        ));
    }
}

pub fn test_max_length(
    value: &str,
    field: &str,
    max: usize,
    label_key: &str,
    errors: &mut Vec<FieldError>,
) {
    if value.chars().count() > max {
        errors.push(FieldError::field(
            field,
            "validation.message.maxLength",
            vec![MessageArg::localized(label_key), MessageArg::text(max)],
        ));
    }
}
