//! Output writer with indentation tracking for generated code.

/// The number of spaces per indentation level.
const INDENT_WIDTH: usize = 4;

/// Writer that tracks indentation and builds generated source.
#[derive(Debug)]
pub struct CodeWriter {
    output: String,
    indent_level: usize,
    at_line_start: bool,
}

impl CodeWriter {
    pub fn new() -> Self {
        Self {
            output: String::new(),
            indent_level: 0,
            at_line_start: true,
        }
    }

    /// Returns the generated source.
    pub fn finish(self) -> String {
        self.output
    }

    pub fn indent(&mut self) {
        self.indent_level += 1;
    }

    pub fn dedent(&mut self) {
        self.indent_level = self.indent_level.saturating_sub(1);
    }

    fn write_indent(&mut self) {
        if self.at_line_start {
            for _ in 0..self.indent_level * INDENT_WIDTH {
                self.output.push(' ');
            }
            self.at_line_start = false;
        }
    }

    /// Write a string, indenting it if it starts a line.
    pub fn write(&mut self, s: &str) {
        if s.is_empty() {
            return;
        }
        self.write_indent();
        self.output.push_str(s);
    }

    pub fn writeln(&mut self, s: &str) {
        self.write(s);
        self.newline();
    }

    pub fn newline(&mut self) {
        self.output.push('\n');
        self.at_line_start = true;
    }

    /// Writes `open`, a newline and increases the indentation.
    pub fn open(&mut self, open: &str) {
        self.writeln(open);
        self.indent();
    }

    /// Decreases the indentation and writes `close` on its own line.
    pub fn close(&mut self, close: &str) {
        self.dedent();
        self.writeln(close);
    }

    /// Writes text byte for byte without indenting it, then ends the line
    /// if the text didn't.
    pub fn write_raw(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.output.push_str(text);
        if !text.ends_with('\n') {
            self.output.push('\n');
        }
        self.at_line_start = true;
    }
}
