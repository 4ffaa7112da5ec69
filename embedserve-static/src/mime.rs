//! MIME type handling

/// Extension of `name`: the text after its last `.`, or `""`
pub fn extension(name: &str) -> &str {
    name.rfind('.').map(|i| &name[i + 1..]).unwrap_or("")
}

/// Look up the MIME type for the extension of `name`
///
/// Returns `None` when the name has no extension or the extension is not in
/// the table, in which case callers sniff the content instead.
pub fn from_extension(name: &str) -> Option<&'static str> {
    match extension(name) {
        "" => None,
        ext => mime_guess::from_ext(ext).first_raw(),
    }
}
