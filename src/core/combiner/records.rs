use serde::{Deserialize, Serialize};
use std::fmt;

/// `(module id, connector or property path)` as written in a project file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub module: u32,
    pub name: String,
}

impl Endpoint {
    pub fn new(module: u32, name: &str) -> Self {
        Self {
            module,
            name: name.to_string(),
        }
    }

    fn parse(text: &str) -> Result<Self, String> {
        let inner = text
            .trim()
            .strip_prefix('(')
            .and_then(|t| t.strip_suffix(')'))
            .ok_or_else(|| format!("expected \"(<id>,<name>)\", got \"{}\"", text))?;
        let (id, name) = inner
            .split_once(',')
            .ok_or_else(|| format!("missing ',' in \"{}\"", text))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(format!("empty name in \"{}\"", text));
        }
        Ok(Self::new(parse_id(id)?, name))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.module, self.name)
    }
}

/// One line of a project file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectRecord {
    /// `MODULE:<id>:<prototype>`
    Module { id: u32, prototype: String },
    /// `DATA:<id>:<filename>`
    Data { id: u32, filename: String },
    /// `CONNECTION:(<id>,<output>)->(<id>,<input>)`
    Connection { from: Endpoint, to: Endpoint },
    /// `PROPERTY:(<id>,<path>)=<value>`
    Property { target: Endpoint, value: String },
}

impl ProjectRecord {
    /// Parse one line. Blank lines and `//` comments yield `Ok(None)`.
    pub fn parse_line(line: &str) -> Result<Option<ProjectRecord>, String> {
        let line = line.trim_end_matches(&['\r', '\n'][..]);
        let trimmed = line.trim_start();
        if trimmed.trim_end().is_empty() || trimmed.starts_with("//") {
            return Ok(None);
        }

        let (kind, rest) = trimmed
            .split_once(':')
            .ok_or_else(|| format!("missing record type in \"{}\"", line))?;

        let record = match kind {
            "MODULE" => {
                let (id, prototype) = split_id(rest)?;
                ProjectRecord::Module {
                    id,
                    prototype: prototype.trim().to_string(),
                }
            }
            "DATA" => {
                let (id, filename) = split_id(rest)?;
                ProjectRecord::Data {
                    id,
                    filename: unescape_value(filename),
                }
            }
            "CONNECTION" => {
                let (from, to) = rest
                    .split_once("->")
                    .ok_or_else(|| format!("missing \"->\" in \"{}\"", line))?;
                ProjectRecord::Connection {
                    from: Endpoint::parse(from)?,
                    to: Endpoint::parse(to)?,
                }
            }
            "PROPERTY" => {
                let (target, value) = rest
                    .split_once(")=")
                    .ok_or_else(|| format!("missing \")=\" in \"{}\"", line))?;
                ProjectRecord::Property {
                    target: Endpoint::parse(&format!("{})", target))?,
                    value: unescape_value(value),
                }
            }
            other => return Err(format!("unknown record type \"{}\"", other)),
        };
        Ok(Some(record))
    }

    /// Module id the record refers to first
    pub fn module_id(&self) -> u32 {
        match self {
            ProjectRecord::Module { id, .. } | ProjectRecord::Data { id, .. } => *id,
            ProjectRecord::Connection { from, .. } => from.module,
            ProjectRecord::Property { target, .. } => target.module,
        }
    }
}

fn parse_id(text: &str) -> Result<u32, String> {
    text.trim()
        .parse::<u32>()
        .map_err(|_| format!("invalid module id \"{}\"", text))
}

fn split_id(rest: &str) -> Result<(u32, &str), String> {
    let (id, tail) = rest
        .split_once(':')
        .ok_or_else(|| format!("expected \"<id>:<value>\", got \"{}\"", rest))?;
    if tail.trim().is_empty() {
        return Err(format!("empty value in \"{}\"", rest));
    }
    Ok((parse_id(id)?, tail))
}

/// Backslash-escape `\\`, line feed and carriage return so a value stays on one line
fn escape_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Inverse of `escape_value`; unknown escapes are kept as written
fn unescape_value(value: &str) -> String {
    let mut plain = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            plain.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => plain.push('\\'),
            Some('n') => plain.push('\n'),
            Some('r') => plain.push('\r'),
            Some(other) => {
                plain.push('\\');
                plain.push(other);
            }
            None => plain.push('\\'),
        }
    }
    plain
}

impl fmt::Display for ProjectRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectRecord::Module { id, prototype } => write!(f, "MODULE:{}:{}", id, prototype),
            ProjectRecord::Data { id, filename } => write!(f, "DATA:{}:{}", id, escape_value(filename)),
            ProjectRecord::Connection { from, to } => write!(f, "CONNECTION:{}->{}", from, to),
            ProjectRecord::Property { target, value } => {
                write!(f, "PROPERTY:{}={}", target, escape_value(value))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_each_record() {
        assert_eq!(
            ProjectRecord::parse_line("MODULE:0:Isosurface").unwrap(),
            Some(ProjectRecord::Module {
                id: 0,
                prototype: "Isosurface".into()
            })
        );
        assert_eq!(
            ProjectRecord::parse_line("DATA:3:C:/data/brain.nii\r\n").unwrap(),
            Some(ProjectRecord::Data {
                id: 3,
                filename: "C:/data/brain.nii".into()
            })
        );
        assert_eq!(
            ProjectRecord::parse_line("CONNECTION:(0,out)->(1,in)").unwrap(),
            Some(ProjectRecord::Connection {
                from: Endpoint::new(0, "out"),
                to: Endpoint::new(1, "in"),
            })
        );
        assert_eq!(
            ProjectRecord::parse_line("PROPERTY:(1,view/opacity)=0.5").unwrap(),
            Some(ProjectRecord::Property {
                target: Endpoint::new(1, "view/opacity"),
                value: "0.5".into()
            })
        );
    }

    #[test]
    fn test_comments_and_blank_lines() {
        assert_eq!(ProjectRecord::parse_line("").unwrap(), None);
        assert_eq!(ProjectRecord::parse_line("   ").unwrap(), None);
        assert_eq!(ProjectRecord::parse_line("// modules").unwrap(), None);
    }

    #[test]
    fn test_malformed_lines() {
        assert!(ProjectRecord::parse_line("MODULE:x:P1").is_err());
        assert!(ProjectRecord::parse_line("MODULE:1:").is_err());
        assert!(ProjectRecord::parse_line("CONNECTION:(0,out)(1,in)").is_err());
        assert!(ProjectRecord::parse_line("PROPERTY:(1,a)0.5").is_err());
        assert!(ProjectRecord::parse_line("WIDGET:1:x").is_err());
    }

    #[test]
    fn test_values_stay_on_one_line() {
        let record = ProjectRecord::Property {
            target: Endpoint::new(0, "Name"),
            value: "line1\nline2\r\\end".into(),
        };
        let line = record.to_string();
        assert_eq!(line, "PROPERTY:(0,Name)=line1\\nline2\\r\\\\end");
        assert_eq!(line.lines().count(), 1);
        assert_eq!(ProjectRecord::parse_line(&line).unwrap(), Some(record));

        let data = ProjectRecord::Data {
            id: 2,
            filename: "C:\\data\\new.nii".into(),
        };
        assert_eq!(data.to_string(), "DATA:2:C:\\\\data\\\\new.nii");
        assert_eq!(ProjectRecord::parse_line(&data.to_string()).unwrap(), Some(data));

        // hand-written files with single backslashes keep them
        assert_eq!(
            ProjectRecord::parse_line("DATA:1:C:\\data\\x.nii").unwrap(),
            Some(ProjectRecord::Data {
                id: 1,
                filename: "C:\\data\\x.nii".into()
            })
        );
    }

    #[test]
    fn test_display_matches_parse() {
        for line in [
            "MODULE:0:P1",
            "DATA:1:/tmp/a b.nii",
            "CONNECTION:(0,out)->(1,in)",
            "PROPERTY:(1,threshold)=0.5",
            "PROPERTY:(1,Name)=",
        ] {
            let record = ProjectRecord::parse_line(line).unwrap().unwrap();
            assert_eq!(record.to_string(), line);
        }
    }
}
