//! String-level path helpers

use std::path::MAIN_SEPARATOR;

/// Join two path strings with exactly one separator between them
pub fn concat_paths(left: &str, right: &str) -> String {
    if left.is_empty() {
        return right.to_string();
    }
    format!(
        "{}{}{}",
        left,
        MAIN_SEPARATOR,
        right.trim_start_matches(['/', '\\', MAIN_SEPARATOR])
    )
}

/// Lexically normalize a path: forward slashes, no empty or `.` segments,
/// `..` folded into its parent where one exists.
///
/// A leading empty segment (absolute path) or leading `.` is kept.
pub fn normalize_path(path: &str) -> String {
    if path == "/" || path == MAIN_SEPARATOR.to_string() {
        return "/".to_string();
    }

    let path = path.replace('\\', "/");
    let mut normalized: Vec<&str> = Vec::new();

    for (idx, part) in path.split('/').enumerate() {
        match part {
            "" | "." => {
                if idx == 0 {
                    normalized.push(part);
                }
            }
            ".." => {
                if normalized.last().is_some_and(|last| *last != "..") {
                    normalized.pop();
                } else {
                    normalized.push(part);
                }
            }
            _ => normalized.push(part),
        }
    }

    normalized.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        let cases = [
            (r"C:\Users\User\Documents\..\PhpLocate", "C:/Users/User/PhpLocate"),
            ("/var/www/html/../PhpLocate", "/var/www/PhpLocate"),
            (r"C:\Users\User\Documents\PhpLocate", "C:/Users/User/Documents/PhpLocate"),
            (r"C:\Users\User\Documents\\PhpLocate", "C:/Users/User/Documents/PhpLocate"),
            (r"C:\Users\User\Documents/PhpLocate", "C:/Users/User/Documents/PhpLocate"),
            ("/var/www/html//PhpLocate", "/var/www/html/PhpLocate"),
            ("/var/www/html/./PhpLocate", "/var/www/html/PhpLocate"),
            ("/var/www/html/.././PhpLocate", "/var/www/PhpLocate"),
            ("", ""),
            (".", "."),
            ("/", "/"),
        ];

        for (input, expected) in cases {
            assert_eq!(normalize_path(input), expected, "input: {:?}", input);
        }
    }

    #[test]
    fn test_concat_paths() {
        assert_eq!(concat_paths("", "a.php"), "a.php");
        let sep = MAIN_SEPARATOR;
        assert_eq!(concat_paths("/srv", "/src/a.php"), format!("/srv{}src/a.php", sep));
        assert_eq!(concat_paths("/srv", "src/a.php"), format!("/srv{}src/a.php", sep));
    }
}
