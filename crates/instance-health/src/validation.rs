//! Validation logic for label and metric names.

const fn is_valid_start_name_char(ch: u8) -> bool {
    ch == b'_' || ch.is_ascii_lowercase()
}

const fn is_valid_name_char(ch: u8) -> bool {
    ch == b'_' || ch.is_ascii_lowercase() || ch.is_ascii_digit()
}

const fn validate_name(name: &str) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("name cannot be empty");
    }

    let name_bytes = name.as_bytes();
    let mut idx = 0;
    while idx < name.len() {
        if name_bytes[idx] > 127 {
            return Err("name contains non-ASCII chars");
        }
        if idx == 0 && !is_valid_start_name_char(name_bytes[idx]) {
            return Err("name starts with disallowed char (allowed chars: [_a-z])");
        } else if !is_valid_name_char(name_bytes[idx]) {
            return Err("name contains disallowed char (allowed chars: [_a-z0-9])");
        }
        idx += 1;
    }
    Ok(())
}

/// Checks that all label names are valid and that none of them is repeated.
#[track_caller]
pub(crate) const fn assert_label_names(names: &[&str]) {
    let mut idx = 0;
    while idx < names.len() {
        if let Err(err) = validate_name(names[idx]) {
            panic!("{}", err);
        }
        let mut other_idx = 0;
        while other_idx < idx {
            if str_eq(names[idx], names[other_idx]) {
                panic!("label names must be unique");
            }
            other_idx += 1;
        }
        idx += 1;
    }
}

/// Checks that a metric name is valid.
#[track_caller]
pub(crate) const fn assert_metric_name(name: &str) {
    if let Err(err) = validate_name(name) {
        panic!("{}", err);
    }
}

const fn str_eq(lhs: &str, rhs: &str) -> bool {
    let (lhs, rhs) = (lhs.as_bytes(), rhs.as_bytes());
    if lhs.len() != rhs.len() {
        return false;
    }
    let mut idx = 0;
    while idx < lhs.len() {
        if lhs[idx] != rhs[idx] {
            return false;
        }
        idx += 1;
    }
    true
}
