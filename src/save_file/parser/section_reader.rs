/// A single `[name]` section of a save file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Section<'a> {
    name: &'a str,
    body: &'a str,
}

impl<'a> Section<'a> {
    /// The section name, without the brackets
    pub fn get_name(&self) -> &'a str {
        self.name
    }

    /// Everything between the header and the next section header
    pub fn get_body(&self) -> &'a str {
        self.body
    }

    /// Iterates over the lines of the body, trimmed of trailing whitespace
    pub fn lines(&self) -> impl Iterator<Item = &'a str> {
        self.body.lines().map(str::trim_end)
    }
}

/// Extracts the name out of a header line, if the line is a header.
fn header_name(line: &str) -> Option<&str> {
    let rest = line.strip_prefix('[')?;
    Some(match rest.find(']') {
        Some(end) => rest[..end].trim(),
        None => rest.trim(),
    })
}

/// An iterator over the sections of a save file.
///
/// The format resembles an INI file: a section starts at a `[name]` line
/// and extends up to the next `[`-prefixed line or the end of the file.
/// Anything before the first header is ignored.
pub struct SectionReader<'a> {
    contents: &'a str,
    /// Byte offset of the next unread line
    offset: usize,
}

impl<'a> SectionReader<'a> {
    pub fn new(contents: &'a str) -> Self {
        SectionReader {
            contents,
            offset: 0,
        }
    }

    /// Returns the next line and advances past it
    fn next_line(&mut self) -> Option<(usize, &'a str)> {
        if self.offset >= self.contents.len() {
            return None;
        }
        let contents = self.contents;
        let start = self.offset;
        let rest = &contents[start..];
        let end = rest.find('\n').map_or(rest.len(), |i| i + 1);
        self.offset += end;
        Some((start, rest[..end].trim_end_matches(['\n', '\r'])))
    }
}

impl<'a> Iterator for SectionReader<'a> {
    type Item = Section<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        // skip to the next header
        let name = loop {
            let (_, line) = self.next_line()?;
            if let Some(name) = header_name(line) {
                break name;
            }
        };
        let contents = self.contents;
        let body_start = self.offset;
        let mut body_end = contents.len();
        while let Some((start, line)) = self.next_line() {
            if line.starts_with('[') {
                // leave the header for the next call
                self.offset = start;
                body_end = start;
                break;
            }
        }
        Some(Section {
            name,
            body: &contents[body_start..body_end],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sections() {
        let contents = "\
preamble=1
[savefile]
version=30
[player0]
name=\"Hammurabi\"

[player1]
[research]
count=2";
        let sections: Vec<_> = SectionReader::new(contents).collect();
        let names: Vec<_> = sections.iter().map(|s| s.get_name()).collect();
        assert_eq!(names, vec!["savefile", "player0", "player1", "research"]);
        assert_eq!(sections[0].get_body(), "version=30\n");
        assert_eq!(sections[1].lines().next(), Some("name=\"Hammurabi\""));
        assert_eq!(sections[2].get_body(), "");
        assert_eq!(sections[3].get_body(), "count=2");
    }

    #[test]
    fn test_crlf() {
        let contents = "[game]\r\nturn=4\r\n[map]\r\n";
        let sections: Vec<_> = SectionReader::new(contents).collect();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].lines().collect::<Vec<_>>(), vec!["turn=4"]);
    }

    #[test]
    fn test_no_sections() {
        assert_eq!(SectionReader::new("a=1\nb=2\n").count(), 0);
        assert_eq!(SectionReader::new("").count(), 0);
    }
}
