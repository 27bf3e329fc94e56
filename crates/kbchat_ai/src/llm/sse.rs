use std::io::{self, BufRead};

/// Server-sent events reader yielding the joined `data:` payload of each event.
pub(crate) struct SseEvents<R> {
    reader: R,
    done: bool,
}

impl<R: BufRead> SseEvents<R> {
    pub(crate) fn new(reader: R) -> Self {
        Self {
            reader,
            done: false,
        }
    }
}

impl<R: BufRead> Iterator for SseEvents<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut data: Vec<String> = Vec::new();
        let mut line = String::new();
        loop {
            line.clear();
            match self.reader.read_line(&mut line) {
                Ok(0) => {
                    self.done = true;
                    return if data.is_empty() {
                        None
                    } else {
                        Some(Ok(data.join("\n")))
                    };
                }
                Ok(_) => {}
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }

            let l = line.trim_end_matches(['\r', '\n']);
            if l.is_empty() {
                if data.is_empty() {
                    continue;
                }
                return Some(Ok(data.join("\n")));
            }
            if l.starts_with(':') {
                continue;
            }
            if let Some(rest) = l.strip_prefix("data:") {
                data.push(rest.strip_prefix(' ').unwrap_or(rest).to_string());
            }
            // event:, id:, retry: carry nothing we use.
        }
    }
}
