/// Produces display text from a message template and positional values.
pub trait MessageFormatter: Send + Sync {
    fn format(&self, template: &str, args: &[&str]) -> String;
}

/// Replaces `{0}`, `{1}`, ... with the matching argument. Unknown
/// placeholders are left as written.
#[derive(Debug, Clone, Copy, Default)]
pub struct PositionalFormatter;

impl MessageFormatter for PositionalFormatter {
    fn format(&self, template: &str, args: &[&str]) -> String {
        let mut output = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(open) = rest.find('{') {
            output.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let replaced = after.find('}').and_then(|close| {
                let index = after[..close].parse::<usize>().ok()?;
                args.get(index).map(|arg| (*arg, close))
            });
            match replaced {
                Some((arg, close)) => {
                    output.push_str(arg);
                    rest = &after[close + 1..];
                }
                None => {
                    output.push('{');
                    rest = after;
                }
            }
        }
        output.push_str(rest);
        output
    }
}

#[cfg(test)]
mod tests {
    use super::{MessageFormatter, PositionalFormatter};

    #[test]
    fn replaces_positional_arguments() {
        let formatter = PositionalFormatter;
        assert_eq!(
            formatter.format("The checksum is {1} instead of {0}", &["7", "1"]),
            "The checksum is 1 instead of 7"
        );
        assert_eq!(formatter.format("{2} {x} {", &["a"]), "{2} {x} {");
    }
}
