//! Field tables for each block type. Keys are matched case-insensitively.

/// Top-level keys of a configuration block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BlockField {
    Request,
    Response,
}

impl BlockField {
    pub(crate) fn parse(key: &str) -> Option<Self> {
        match key.to_ascii_lowercase().as_str() {
            "request" => Some(BlockField::Request),
            "response" => Some(BlockField::Response),
            _ => None,
        }
    }
}

/// Keys of a `request` mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RequestField {
    Url,
    Method,
    Headers,
    Query,
    Post,
    File,
}

impl RequestField {
    pub(crate) fn parse(key: &str) -> Option<Self> {
        match key.to_ascii_lowercase().as_str() {
            "url" => Some(RequestField::Url),
            "method" => Some(RequestField::Method),
            "headers" => Some(RequestField::Headers),
            "query" => Some(RequestField::Query),
            "post" => Some(RequestField::Post),
            "file" => Some(RequestField::File),
            _ => None,
        }
    }
}

/// Keys of a `response` mapping (or of each element of a response sequence).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ResponseField {
    Status,
    Headers,
    Body,
    File,
    Latency,
}

impl ResponseField {
    pub(crate) fn parse(key: &str) -> Option<Self> {
        match key.to_ascii_lowercase().as_str() {
            "status" => Some(ResponseField::Status),
            "headers" => Some(ResponseField::Headers),
            "body" => Some(ResponseField::Body),
            "file" => Some(ResponseField::File),
            "latency" => Some(ResponseField::Latency),
            _ => None,
        }
    }
}

/// Extensions of referenced files that are decoded as UTF-8 text. Anything
/// else is loaded as raw bytes.
pub(crate) const TEXT_EXTENSIONS: &[&str] = &[
    "ani", "bas", "bat", "c", "cc", "cfg", "conf", "cpp", "cs", "css", "csv", "dat", "dtd",
    "h", "htm", "html", "ini", "java", "js", "json", "jsp", "log", "md", "php", "pl",
    "properties", "py", "rb", "rtf", "rs", "sh", "sql", "svg", "tcl", "text", "toml", "tsv",
    "txt", "xhtml", "xml", "xsd", "xsl", "xslt", "yaml", "yml",
];

pub(crate) fn is_text_extension(extension: &str) -> bool {
    let extension = extension.to_ascii_lowercase();
    TEXT_EXTENSIONS.contains(&extension.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_names_are_case_insensitive() {
        assert_eq!(BlockField::parse("REQUEST"), Some(BlockField::Request));
        assert_eq!(RequestField::parse("Url"), Some(RequestField::Url));
        assert_eq!(RequestField::parse("POST"), Some(RequestField::Post));
        assert_eq!(ResponseField::parse("Latency"), Some(ResponseField::Latency));
        assert_eq!(ResponseField::parse("url"), None);
    }

    #[test]
    fn test_text_extensions() {
        assert!(is_text_extension("json"));
        assert!(is_text_extension("HTML"));
        assert!(!is_text_extension("png"));
        assert!(!is_text_extension("pdf"));
    }
}
