/// Incremental UTF-8 line splitter for a chunked response body.
///
/// Bytes of a multi-byte character split across chunks are held back until
/// the rest arrives. Invalid sequences decode to U+FFFD. Complete lines are
/// returned without their `\n` / `\r\n` terminator; the unterminated tail
/// stays buffered for the next `feed`.
#[derive(Debug, Default)]
pub struct ChunkDecoder {
    incomplete: Vec<u8>,
    line_buffer: String,
}

impl ChunkDecoder {
    /// Decodes `chunk` and returns every line completed by it, in order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.decode(chunk);
        self.take_complete_lines()
    }

    /// Text received after the last line terminator.
    pub fn buffered(&self) -> &str {
        &self.line_buffer
    }

    /// Drops buffered text and held-back bytes.
    pub fn reset(&mut self) {
        self.incomplete.clear();
        self.line_buffer.clear();
    }

    fn decode(&mut self, chunk: &[u8]) {
        let mut bytes = std::mem::take(&mut self.incomplete);
        bytes.extend_from_slice(chunk);

        let mut rest = bytes.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    self.line_buffer.push_str(text);
                    return;
                }
                Err(err) => {
                    let (valid, tail) = rest.split_at(err.valid_up_to());
                    self.line_buffer.push_str(&String::from_utf8_lossy(valid));
                    match err.error_len() {
                        Some(len) => {
                            self.line_buffer.push(char::REPLACEMENT_CHARACTER);
                            rest = &tail[len..];
                        }
                        None => {
                            self.incomplete = tail.to_vec();
                            return;
                        }
                    }
                }
            }
        }
    }

    fn take_complete_lines(&mut self) -> Vec<String> {
        let Some(last_newline) = self.line_buffer.rfind('\n') else {
            return Vec::new();
        };
        let tail = self.line_buffer.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.line_buffer, tail);
        complete[..last_newline]
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
            .collect()
    }
}
