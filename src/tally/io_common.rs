use std::path::Path;

pub fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_string()
}

/// Booths submitted without an id are named after the file and their position in it.
pub fn make_default_id(path: &str) -> impl Fn(usize) -> String {
    let simplified_file_name = simplify_file_name(path);
    move |lineno| format!("{}-{:04}", simplified_file_name, lineno)
}

/// Field names as written by hand are not consistent: `boothId`, `booth_id`
/// and `Booth ID` all designate the same field.
pub fn field_key(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_keys() {
        assert_eq!(field_key("boothId"), "boothid");
        assert_eq!(field_key("Booth ID"), "boothid");
        assert_eq!(field_key("booth_id"), "boothid");
    }

    #[test]
    fn default_ids() {
        let f = make_default_id("/data/warringah/booths.json");
        assert_eq!(f(3), "booths.json-0003");
    }
}
