use std::collections::VecDeque;
use std::io::{self, BufRead};

/// Append-only line buffer that receives everything `print` writes.
#[derive(Debug, Default)]
pub struct OutputBuffer {
    buffer: String,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_line(&mut self, line: &str) {
        self.buffer.push_str(line);
        self.buffer.push('\n');
    }

    /// Capture the accumulated output and reset the buffer.
    pub fn take(&mut self) -> String {
        std::mem::take(&mut self.buffer)
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

/// Where `input()` reads its lines from.
#[derive(Debug, Default)]
pub enum InputSource {
    #[default]
    Stdin,
    Text(VecDeque<String>),
}

impl InputSource {
    pub fn from_text(text: &str) -> Self {
        InputSource::Text(text.lines().map(str::to_string).collect())
    }

    /// Read one line without its terminator. `Ok(None)` once input is exhausted.
    pub fn read_line(&mut self) -> io::Result<Option<String>> {
        match self {
            InputSource::Stdin => {
                let mut line = String::new();
                if io::stdin().lock().read_line(&mut line)? == 0 {
                    return Ok(None);
                }
                let trimmed_len = line.trim_end_matches(&['\n', '\r'][..]).len();
                line.truncate(trimmed_len);
                Ok(Some(line))
            }
            InputSource::Text(lines) => Ok(lines.pop_front()),
        }
    }
}
