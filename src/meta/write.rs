use super::Meta;

impl Meta {
    pub fn write_header(&self) -> String {
        let mut out = String::new();
        if self.yaml_sep {
            out.push_str("---\n");
        }
        for (key, value) in self.pairs() {
            out.push_str(key);
            out.push(':');
            if !value.is_empty() {
                out.push(' ');
                out.push_str(value);
            }
            out.push('\n');
        }
        if self.yaml_sep {
            out.push_str("---\n");
        }
        out
    }

    pub fn write_zettel(&self, content: &[u8]) -> Vec<u8> {
        let mut out = self.write_header().into_bytes();
        if !self.yaml_sep {
            out.push(b'\n');
        }
        out.extend_from_slice(content);
        out
    }
}
