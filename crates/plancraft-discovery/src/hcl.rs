//! Minimal HCL scanning for the few facts discovery needs
//!
//! Only two things are ever read from `.tf` sources: the
//! `required_version` attribute of a `terraform` block, and the workspace
//! name declared in a `cloud` block or a `remote` backend. This is a
//! brace-matching scanner, not a parser; expressions are never evaluated.

/// `required_version` of the first `terraform` block that sets it
#[must_use]
pub fn required_version(source: &str) -> Option<String> {
    let source = strip_comments(source);
    blocks(&source)
        .into_iter()
        .filter(|b| b.kind == "terraform")
        .find_map(|b| attribute(b.body, "required_version"))
}

/// Workspace name from `terraform { cloud { workspaces { name = ".." } } }`
/// or `terraform { backend "remote" { workspaces { name = ".." } } }`
#[must_use]
pub fn workspace_name(source: &str) -> Option<String> {
    let source = strip_comments(source);
    for terraform in blocks(&source).into_iter().filter(|b| b.kind == "terraform") {
        for inner in blocks(terraform.body) {
            let declares = inner.kind == "cloud"
                || (inner.kind == "backend" && inner.labels.first().map(String::as_str) == Some("remote"));
            if !declares {
                continue;
            }
            let name = blocks(inner.body)
                .into_iter()
                .filter(|b| b.kind == "workspaces")
                .find_map(|b| attribute(b.body, "name"));
            if name.is_some() {
                return name;
            }
        }
    }
    None
}

/// A block at the top level of a body
#[derive(Debug)]
struct Block<'a> {
    kind: String,
    labels: Vec<String>,
    body: &'a str,
}

/// Blocks directly inside `body`, in source order
fn blocks(body: &str) -> Vec<Block<'_>> {
    let bytes = body.as_bytes();
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut header_start = 0usize;
    let mut header = "";
    let mut open = 0usize;
    let mut i = 0usize;

    while i < bytes.len() {
        let b = bytes[i];
        if in_string {
            match b {
                b'\\' => i += 1,
                b'"' => in_string = false,
                _ => {}
            }
            i += 1;
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => {
                if depth == 0 {
                    header = body[header_start..i].trim();
                    open = i + 1;
                }
                depth += 1;
            }
            b'}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some((kind, labels)) = block_header(header) {
                        out.push(Block {
                            kind,
                            labels,
                            body: &body[open..i],
                        });
                    }
                    header_start = i + 1;
                }
            }
            b'\n' if depth == 0 => header_start = i + 1,
            _ => {}
        }
        i += 1;
    }
    out
}

/// Split `backend "remote"` into its type and labels; `None` for
/// attribute assignments such as `tags = {`
fn block_header(header: &str) -> Option<(String, Vec<String>)> {
    if header.contains('=') {
        return None;
    }
    let mut tokens = header.split_whitespace();
    let kind = tokens.next()?;
    if !kind.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return None;
    }
    let labels = tokens.map(|t| t.trim_matches('"').to_string()).collect();
    Some((kind.to_string(), labels))
}

/// A string literal attribute at depth zero of `body`
fn attribute(body: &str, key: &str) -> Option<String> {
    top_level_text(body).lines().find_map(|line| {
        let (name, value) = line.split_once('=')?;
        if name.trim() != key {
            return None;
        }
        let literal = value.trim().strip_prefix('"')?.strip_suffix('"')?;
        (!literal.contains('"')).then(|| literal.to_string())
    })
}

/// `body` with every nested block's content removed
fn top_level_text(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for c in body.chars() {
        if in_string {
            if depth == 0 {
                out.push(c);
            }
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                if depth == 0 {
                    out.push(c);
                }
            }
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(c),
            '\n' => out.push(c),
            _ => {}
        }
    }
    out
}

/// Remove `#`, `//` and `/* */` comments, keeping line structure
fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    let mut in_string = false;
    let mut escaped = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '#' => skip_line(&mut chars, &mut out),
            '/' if chars.peek() == Some(&'/') => skip_line(&mut chars, &mut out),
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for c in chars.by_ref() {
                    if c == '\n' {
                        out.push('\n');
                    }
                    if prev == '*' && c == '/' {
                        break;
                    }
                    prev = c;
                }
            }
            _ => out.push(c),
        }
    }
    out
}

fn skip_line(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, out: &mut String) {
    for c in chars.by_ref() {
        if c == '\n' {
            out.push('\n');
            break;
        }
    }
}
