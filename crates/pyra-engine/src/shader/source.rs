use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use super::ShaderError;

/// Reads a shader source file line by line, terminating every line with `\n`.
///
/// `\r\n` line endings are normalized away.
pub fn read_source(path: impl AsRef<Path>) -> Result<String, ShaderError> {
    let path = path.as_ref();
    let io_err = |source| ShaderError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(io_err)?;
    let mut content = String::new();
    for line in BufReader::new(file).lines() {
        content.push_str(&line.map_err(io_err)?);
        content.push('\n');
    }
    Ok(content)
}

/// Like [`read_source`] but substitutes empty source on failure.
///
/// The failure is logged; the empty source then fails compilation, which is
/// where the caller sees it.
pub fn read_source_or_empty(path: impl AsRef<Path>) -> String {
    match read_source(path) {
        Ok(s) => s,
        Err(e) => {
            log::error!("{e}");
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn temp_file(name: &str, contents: &[u8]) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("pyra-{}-{name}", std::process::id()));
        let mut f = File::create(&path).unwrap();
        f.write_all(contents).unwrap();
        path
    }

    #[test]
    fn normalizes_line_endings() {
        let path = temp_file("crlf.vert", b"#version 330\r\nvoid main() {}");
        let src = read_source(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(src, "#version 330\nvoid main() {}\n");
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = read_source("/definitely/not/here.frag").unwrap_err();
        assert!(matches!(err, ShaderError::Io { .. }));
        assert!(err.to_string().contains("here.frag"));
        assert_eq!(read_source_or_empty("/definitely/not/here.frag"), "");
    }
}
