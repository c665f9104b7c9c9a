//! `%YAML` and `%TAG` directives, and the tag handle table they build.

use crate::options::Version;

/// Prefix of the `!!` handle.
pub const YAML_TAG_PREFIX: &str = "tag:yaml.org,2002:";

/// Directives in effect for one document.
#[derive(Debug, Clone, PartialEq)]
pub struct Directives {
    pub version: Version,
    /// Set when the document had a `%YAML` directive.
    pub explicit_version: bool,
    /// `%TAG` handles in order of appearance, after the `!!` default.
    pub tags: Vec<(String, String)>,
    /// The document started with an explicit `---`.
    pub doc_start: bool,
    /// The document was closed with `...`.
    pub doc_end: bool,
}

impl Directives {
    pub fn new(version: Version) -> Self {
        Self {
            version,
            explicit_version: false,
            tags: vec![("!!".to_string(), YAML_TAG_PREFIX.to_string())],
            doc_start: false,
            doc_end: false,
        }
    }

    /// Handle one directive line. `on_error` gets an offset relative to the
    /// start of the line, a message, and whether it's only a warning.
    /// Returns `false` if the directive was not applied.
    pub fn add(&mut self, line: &str, on_error: &mut dyn FnMut(usize, String, bool)) -> bool {
        let mut parts = line.split([' ', '\t']).filter(|part| !part.is_empty());
        let name = parts.next().unwrap_or_default();
        let args: Vec<&str> = parts.take_while(|part| !part.starts_with('#')).collect();
        tracing::trace!(directive = name, ?args, "directive");
        match name {
            "%TAG" => {
                if args.len() != 2 {
                    on_error(
                        0,
                        "%TAG directive should contain exactly two parts".to_string(),
                        false,
                    );
                    if args.len() < 2 {
                        return false;
                    }
                }
                let (handle, prefix) = (args[0], args[1]);
                if !is_tag_handle(handle) {
                    on_error(0, format!("Invalid tag handle {}", handle), false);
                    return false;
                }
                if let Some(entry) = self.tags.iter_mut().find(|(h, _)| h == handle) {
                    if handle != "!!" || entry.1 != YAML_TAG_PREFIX {
                        on_error(0, format!("Repeated %TAG directive for {}", handle), true);
                    }
                    entry.1 = prefix.to_string();
                } else {
                    self.tags.push((handle.to_string(), prefix.to_string()));
                }
                true
            }
            "%YAML" => {
                if self.explicit_version {
                    on_error(0, "Repeated %YAML directive".to_string(), true);
                }
                self.explicit_version = true;
                if args.len() != 1 {
                    on_error(
                        0,
                        "%YAML directive should contain exactly one part".to_string(),
                        false,
                    );
                    return false;
                }
                match args[0].parse::<Version>() {
                    Ok(version) => {
                        self.version = version;
                        true
                    }
                    Err(message) => {
                        let looks_valid = looks_like_version(args[0]);
                        on_error(6, message, looks_valid);
                        false
                    }
                }
            }
            _ => {
                on_error(0, format!("Unknown directive {}", name), true);
                false
            }
        }
    }

    /// The prefix bound to a handle.
    pub fn prefix(&self, handle: &str) -> Option<&str> {
        self.tags
            .iter()
            .rev()
            .find(|(h, _)| h == handle)
            .map(|(_, p)| p.as_str())
    }

    /// Resolve the source of a tag property (`!!str`, `!e!foo`, `!<x>`) to
    /// a full tag name. Returns `None` if it cannot be resolved.
    pub fn tag_name(&self, source: &str, on_error: &mut dyn FnMut(String)) -> Option<String> {
        if source == "!" {
            return Some("!".to_string());
        }
        if !source.starts_with('!') {
            on_error(format!("Not a valid tag: {}", source));
            return None;
        }
        if let Some(rest) = source.strip_prefix("!<") {
            let verbatim = rest.strip_suffix('>');
            if verbatim.is_none() {
                on_error("Verbatim tags must end with a >".to_string());
            }
            let verbatim = verbatim.unwrap_or(rest);
            if verbatim == "!" || verbatim == "!!" {
                on_error(format!(
                    "Verbatim tags aren't resolved, so {} is invalid.",
                    source
                ));
                return None;
            }
            return Some(verbatim.to_string());
        }
        // The handle runs up to and including the last `!`.
        let split = source.rfind('!').map_or(1, |i| i + 1);
        let (handle, suffix) = source.split_at(split);
        if suffix.is_empty() {
            on_error(format!("The {} tag has no suffix", source));
        }
        if let Some(prefix) = self.prefix(handle) {
            return match percent_decode(suffix) {
                Ok(suffix) => Some(format!("{}{}", prefix, suffix)),
                Err(message) => {
                    on_error(message);
                    None
                }
            };
        }
        if handle == "!" {
            // Local tag.
            return Some(source.to_string());
        }
        on_error(format!("Could not resolve tag: {}", source));
        None
    }

    /// Shortest source form of a full tag name.
    pub fn tag_string(&self, tag: &str) -> String {
        for (handle, prefix) in self.tags.iter().rev() {
            if let Some(suffix) = tag.strip_prefix(prefix.as_str()) {
                if !suffix.is_empty() && suffix.chars().all(is_tag_char) {
                    return format!("{}{}", handle, suffix);
                }
            }
        }
        if tag.starts_with('!') {
            tag.to_string()
        } else {
            format!("!<{}>", tag)
        }
    }

    /// Source lines of the directives the stringifier must repeat.
    pub fn to_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if self.explicit_version {
            lines.push(format!("%YAML {}", self.version));
        }
        for (handle, prefix) in &self.tags {
            if handle == "!!" && prefix == YAML_TAG_PREFIX {
                continue;
            }
            lines.push(format!("%TAG {} {}", handle, prefix));
        }
        lines
    }
}

fn is_tag_handle(handle: &str) -> bool {
    handle == "!"
        || handle == "!!"
        || (handle.len() > 2
            && handle.starts_with('!')
            && handle.ends_with('!')
            && handle[1..handle.len() - 1]
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '-'))
}

fn is_tag_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || "-#;/?:@&=+$_.~*'()".contains(ch)
}

fn looks_like_version(s: &str) -> bool {
    match s.split_once('.') {
        Some((major, minor)) => {
            !major.is_empty()
                && !minor.is_empty()
                && major.chars().all(|ch| ch.is_ascii_digit())
                && minor.chars().all(|ch| ch.is_ascii_digit())
        }
        None => false,
    }
}

/// Decode `%XX` escapes in a tag suffix.
fn percent_decode(s: &str) -> Result<String, String> {
    if !s.contains('%') {
        return Ok(s.to_string());
    }
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = s.get(i + 1..i + 3).unwrap_or_default();
            match u8::from_str_radix(hex, 16) {
                Ok(byte) if hex.len() == 2 => out.push(byte),
                _ => return Err(format!("Invalid percent escape in tag: {}", s)),
            }
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|_| format!("Invalid UTF-8 in tag: {}", s))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add(dirs: &mut Directives, line: &str) -> Vec<(String, bool)> {
        let mut errors = Vec::new();
        dirs.add(line, &mut |_, msg, warning| errors.push((msg, warning)));
        errors
    }

    fn resolve(dirs: &Directives, source: &str) -> (Option<String>, Vec<String>) {
        let mut errors = Vec::new();
        let name = dirs.tag_name(source, &mut |msg| errors.push(msg));
        (name, errors)
    }

    #[test]
    fn test_yaml_directive() {
        let mut dirs = Directives::new(Version::V1_2);
        assert!(add(&mut dirs, "%YAML 1.1").is_empty());
        assert_eq!(dirs.version, Version::V1_1);
        assert!(dirs.explicit_version);

        let errors = add(&mut dirs, "%YAML 1.2");
        assert_eq!(errors, vec![("Repeated %YAML directive".to_string(), true)]);
        assert_eq!(dirs.version, Version::V1_2);

        let mut dirs = Directives::new(Version::V1_2);
        assert_eq!(
            add(&mut dirs, "%YAML 1.3"),
            vec![("Unsupported YAML version 1.3".to_string(), true)]
        );
        assert_eq!(
            add(&mut Directives::new(Version::V1_2), "%YAML x"),
            vec![("Unsupported YAML version x".to_string(), false)]
        );
    }

    #[test]
    fn test_tag_directive_and_names() {
        let mut dirs = Directives::new(Version::V1_2);
        assert!(add(&mut dirs, "%TAG !e! tag:example.com,2000:app/").is_empty());
        assert_eq!(
            resolve(&dirs, "!e!foo"),
            (Some("tag:example.com,2000:app/foo".to_string()), vec![])
        );
        assert_eq!(
            resolve(&dirs, "!!str").0.as_deref(),
            Some("tag:yaml.org,2002:str")
        );
        assert_eq!(resolve(&dirs, "!local").0.as_deref(), Some("!local"));
        assert_eq!(resolve(&dirs, "!<tag:x>").0.as_deref(), Some("tag:x"));
        assert_eq!(resolve(&dirs, "!e!a%21b").0.as_deref(), Some("tag:example.com,2000:app/a!b"));
        let (name, errors) = resolve(&dirs, "!x!foo");
        assert_eq!(name, None);
        assert_eq!(errors, vec!["Could not resolve tag: !x!foo".to_string()]);
        assert_eq!(resolve(&dirs, "!<!>").0, None);

        assert_eq!(dirs.tag_string("tag:example.com,2000:app/foo"), "!e!foo");
        assert_eq!(dirs.tag_string("tag:yaml.org,2002:int"), "!!int");
        assert_eq!(dirs.tag_string("urn:other"), "!<urn:other>");
        assert_eq!(dirs.to_lines(), vec!["%TAG !e! tag:example.com,2000:app/"]);
    }

    #[test]
    fn test_unknown_and_repeated() {
        let mut dirs = Directives::new(Version::V1_2);
        assert_eq!(
            add(&mut dirs, "%FOO bar"),
            vec![("Unknown directive %FOO".to_string(), true)]
        );
        add(&mut dirs, "%TAG !a! one:");
        let errors = add(&mut dirs, "%TAG !a! two:");
        assert_eq!(errors, vec![("Repeated %TAG directive for !a!".to_string(), true)]);
        assert_eq!(dirs.prefix("!a!"), Some("two:"));
    }
}
