//! A small markup abbreviation grammar for tests and the replay tool.
//!
//! [`TagGrammar`] understands element names, `.class`, `#id`, `[attr=value]`,
//! `{text}`, `*n` repeats, the `>`, `+` and `^` operators and `( )` groups.
//! It expands to single-line HTML with numbered tab stops. A `.` or `#`
//! still waiting for its name at the very end is accepted. It is nowhere
//! near a full abbreviation engine, hosts plug theirs in through
//! [`Grammar`].

use ropey::Rope;
use smallvec::SmallVec;

use crate::{
  Tendril,
  grammar::{
    Context,
    ExpandError,
    Extracted,
    Grammar,
    Options,
    ParseError,
  },
  syntax::SyntaxId,
};

const VOID_ELEMENTS: &[&str] = &["br", "hr", "img", "input", "link", "meta"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
  /// Empty for implicit names, resolved from the parent on expansion.
  pub name:       Tendril,
  pub id:         Option<Tendril>,
  pub classes:    Vec<Tendril>,
  pub attributes: Vec<(Tendril, Option<Tendril>)>,
  pub text:       Option<Tendril>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
  Element(Element),
  Group(Vec<TagNode>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagNode {
  pub item:     Item,
  pub repeat:   usize,
  pub children: Vec<TagNode>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagAst {
  pub nodes: Vec<TagNode>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TagGrammar;

fn char_is_name(ch: char) -> bool {
  ch.is_alphanumeric() || matches!(ch, '-' | '_' | ':' | '!' | '@' | '$')
}

struct Parser {
  chars: Vec<char>,
  pos:   usize,
}

impl Parser {
  fn peek(&self) -> Option<char> {
    self.chars.get(self.pos).copied()
  }

  fn bump(&mut self) -> Option<char> {
    let ch = self.peek()?;
    self.pos += 1;
    Some(ch)
  }

  fn error(&self, message: &str) -> ParseError {
    match self.peek() {
      Some(ch) => ParseError::new(format!("{message}, found '{ch}'"), self.pos),
      None => ParseError::new(format!("{message}, found end of abbreviation"), self.pos),
    }
  }

  fn take_while(&mut self, f: impl Fn(char) -> bool) -> Tendril {
    let mut taken = Tendril::new();
    while let Some(ch) = self.peek().filter(|&ch| f(ch)) {
      taken.push(ch);
      self.pos += 1;
    }
    taken
  }

  fn sequence(&mut self) -> Result<Vec<TagNode>, ParseError> {
    // levels[i + 1] holds the children of the last node of levels[i]
    let mut levels: Vec<Vec<TagNode>> = vec![Vec::new()];
    loop {
      let node = self.term()?;
      if let Some(level) = levels.last_mut() {
        level.push(node);
      }
      match self.peek() {
        None | Some(')') => break,
        Some('+') => {
          self.bump();
        },
        Some('>') => {
          self.bump();
          levels.push(Vec::new());
        },
        Some('^') => {
          while self.peek() == Some('^') {
            self.bump();
            if levels.len() > 1 {
              fold_level(&mut levels);
            }
          }
        },
        Some(_) => return Err(self.error("unexpected character")),
      }
    }

    while levels.len() > 1 {
      fold_level(&mut levels);
    }
    Ok(levels.pop().unwrap_or_default())
  }

  fn term(&mut self) -> Result<TagNode, ParseError> {
    let item = if self.peek() == Some('(') {
      self.bump();
      let nodes = if self.peek() == Some(')') {
        Vec::new()
      } else {
        self.sequence()?
      };
      if self.bump() != Some(')') {
        return Err(ParseError::new("unclosed group", self.pos));
      }
      Item::Group(nodes)
    } else {
      Item::Element(self.element()?)
    };

    let repeat = self.repeat()?;
    Ok(TagNode {
      item,
      repeat,
      children: Vec::new(),
    })
  }

  fn element(&mut self) -> Result<Element, ParseError> {
    let start = self.pos;
    let mut element = Element {
      name: self.take_while(char_is_name),
      ..Element::default()
    };

    loop {
      match self.peek() {
        Some('.') => {
          self.bump();
          let class = self.take_while(char_is_name);
          if !class.is_empty() {
            element.classes.push(class);
          } else if self.peek().is_some() {
            return Err(self.error("expected class name"));
          }
        },
        Some('#') => {
          self.bump();
          let id = self.take_while(char_is_name);
          if !id.is_empty() {
            element.id = Some(id);
          } else if self.peek().is_some() {
            return Err(self.error("expected id"));
          }
        },
        Some('[') => {
          self.bump();
          self.attributes(&mut element)?;
        },
        Some('{') => {
          self.bump();
          let text = self.take_while(|ch| ch != '}' && ch != '\n');
          if self.bump() != Some('}') {
            return Err(ParseError::new("unclosed text", self.pos));
          }
          element.text = Some(text);
        },
        _ => break,
      }
    }

    if self.pos == start {
      return Err(self.error("expected element"));
    }
    Ok(element)
  }

  fn attributes(&mut self, element: &mut Element) -> Result<(), ParseError> {
    loop {
      self.take_while(|ch| ch == ' ');
      match self.peek() {
        Some(']') => {
          self.bump();
          return Ok(());
        },
        None => return Err(ParseError::new("unclosed attribute list", self.pos)),
        Some(_) => {},
      }

      let name = self.take_while(char_is_name);
      if name.is_empty() {
        return Err(self.error("expected attribute name"));
      }
      let value = if self.peek() == Some('=') {
        self.bump();
        Some(self.attribute_value()?)
      } else {
        None
      };
      element.attributes.push((name, value));

      if !matches!(self.peek(), Some(' ' | ']')) {
        return Err(self.error("unexpected character in attributes"));
      }
    }
  }

  fn attribute_value(&mut self) -> Result<Tendril, ParseError> {
    match self.peek() {
      Some(quote @ ('"' | '\'')) => {
        self.bump();
        let value = self.take_while(|ch| ch != quote && ch != '\n');
        if self.bump() != Some(quote) {
          return Err(ParseError::new("unclosed attribute value", self.pos));
        }
        Ok(value)
      },
      _ => Ok(self.take_while(char_is_name)),
    }
  }

  fn repeat(&mut self) -> Result<usize, ParseError> {
    if self.peek() != Some('*') {
      return Ok(1);
    }
    self.bump();
    let digits = self.take_while(|ch| ch.is_ascii_digit());
    match digits.parse::<usize>() {
      Ok(count) if count > 0 => Ok(count),
      _ => Err(self.error("expected repeat count")),
    }
  }
}

fn fold_level(levels: &mut Vec<Vec<TagNode>>) {
  let Some(children) = levels.pop() else {
    return;
  };
  if let Some(parent) = levels.last_mut().and_then(|level| level.last_mut()) {
    parent.children.extend(children);
  }
}

fn implicit_name(parent: Option<&str>) -> &'static str {
  match parent {
    Some("ul" | "ol") => "li",
    Some("table" | "tbody" | "thead") => "tr",
    Some("tr") => "td",
    Some("select") => "option",
    _ => "div",
  }
}

struct Renderer {
  out:  String,
  stop: usize,
}

impl Renderer {
  fn tab_stop(&mut self) {
    self.out.push_str(&format!("${{{}}}", self.stop));
    self.stop += 1;
  }

  fn nodes(&mut self, nodes: &[TagNode], parent: Option<&str>) {
    for node in nodes {
      for _ in 0..node.repeat {
        match &node.item {
          Item::Element(element) => self.element(element, &node.children, parent),
          Item::Group(items) => {
            self.nodes(items, parent);
            self.nodes(&node.children, parent);
          },
        }
      }
    }
  }

  fn element(&mut self, element: &Element, children: &[TagNode], parent: Option<&str>) {
    let name = if element.name.is_empty() {
      implicit_name(parent)
    } else {
      element.name.as_str()
    };

    self.out.push('<');
    self.out.push_str(name);
    if let Some(id) = &element.id {
      self.out.push_str(&format!(" id=\"{id}\""));
    }
    for (index, class) in element.classes.iter().enumerate() {
      self.out.push_str(if index == 0 { " class=\"" } else { " " });
      self.out.push_str(class);
    }
    if !element.classes.is_empty() {
      self.out.push('"');
    }
    for (attr, value) in &element.attributes {
      self.out.push_str(&format!(" {attr}=\""));
      match value {
        Some(value) => self.out.push_str(value),
        None => self.tab_stop(),
      }
      self.out.push('"');
    }
    self.out.push('>');

    if VOID_ELEMENTS.contains(&name) {
      return;
    }
    if let Some(text) = &element.text {
      self.out.push_str(text);
    }
    if children.is_empty() {
      if element.text.is_none() {
        self.tab_stop();
      }
    } else {
      self.nodes(children, Some(name));
    }
    self.out.push_str(&format!("</{name}>"));
  }
}

/// Parses one tag starting right after `<`, returning its name, attributes
/// and whether it closes itself.
fn scan_tag(tag: &str) -> (Tendril, SmallVec<[(Tendril, Option<Tendril>); 2]>, bool) {
  let tag = tag.trim_end_matches('>');
  let self_closing = tag.ends_with('/');
  let mut words = tag.trim_end_matches('/').split_whitespace();
  let name = Tendril::from(words.next().unwrap_or_default());

  let attributes = words
    .map(|word| match word.split_once('=') {
      Some((attr, value)) => (
        Tendril::from(attr),
        Some(Tendril::from(value.trim_matches(|c| c == '"' || c == '\''))),
      ),
      None => (Tendril::from(word), None),
    })
    .collect();
  (name, attributes, self_closing)
}

impl Grammar for TagGrammar {
  type Ast = TagAst;

  fn extract(&self, line: &str, pos: usize, options: &Options) -> Option<Extracted> {
    let chars: Vec<char> = line.chars().take(pos).collect();
    let end = chars.len();

    let (start, location) = match &options.prefix {
      Some(prefix) => {
        let prefix: Vec<char> = prefix.chars().collect();
        let start = (0..end.checked_sub(prefix.len())?)
          .rev()
          .take_while(|&at| !chars[at + prefix.len()].is_whitespace())
          .find(|&at| chars[at..].starts_with(&prefix))?;
        (start, start + prefix.len())
      },
      None => {
        let mut start = end;
        while start > 0 && !matches!(chars[start - 1], ' ' | '\t' | '<' | ';' | '"' | '\'') {
          start -= 1;
        }
        // `<p>ul` stops inside the tag, skip to its end
        if start > 0 && chars[start - 1] == '<' {
          if let Some(gt) = chars[start..end].iter().position(|&ch| ch == '>') {
            start += gt + 1;
          }
        }
        (start, start)
      },
    };

    if location >= end {
      return None;
    }
    Some(Extracted {
      abbreviation: Tendril::from(chars[location..end].iter().collect::<String>()),
      start,
      end,
      location,
    })
  }

  fn parse(&self, abbreviation: &str, _options: &Options) -> Result<TagAst, ParseError> {
    let mut parser = Parser {
      chars: abbreviation.chars().collect(),
      pos:   0,
    };
    let nodes = parser.sequence()?;
    if parser.peek().is_some() {
      return Err(parser.error("unmatched group close"));
    }
    Ok(TagAst { nodes })
  }

  fn expand(&self, ast: &TagAst, options: &Options) -> Result<Tendril, ExpandError> {
    let mut renderer = Renderer {
      out:  String::new(),
      stop: 1,
    };
    let parent = options.context.as_ref().map(|context| context.name.as_str());
    renderer.nodes(&ast.nodes, parent);

    if renderer.out.is_empty() {
      return Err(ExpandError::Empty);
    }
    Ok(renderer.out.into())
  }

  fn capture_context(&self, text: &Rope, pos: usize, syntax: &SyntaxId) -> Option<Context> {
    if matches!(syntax.as_str(), "css" | "scss" | "less") {
      return None;
    }

    let before = text.slice(..pos.min(text.len_chars())).to_string();
    let mut open: Vec<Context> = Vec::new();
    let mut rest = before.as_str();
    while let Some(at) = rest.find('<') {
      rest = &rest[at + 1..];
      let Some(close) = rest.find('>') else {
        break;
      };
      let tag = &rest[..=close];
      rest = &rest[close + 1..];

      if let Some(closing) = tag.strip_prefix('/') {
        let name = closing.trim_end_matches('>').trim();
        if let Some(index) = open.iter().rposition(|context| context.name.as_str() == name) {
          open.truncate(index);
        }
        continue;
      }
      let (name, attributes, self_closing) = scan_tag(tag);
      if name.is_empty() || self_closing || VOID_ELEMENTS.contains(&name.as_str()) {
        continue;
      }
      open.push(Context { name, attributes });
    }
    open.pop()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn expand(abbr: &str) -> String {
    let ast = TagGrammar.parse(abbr, &Options::default()).unwrap();
    TagGrammar.expand(&ast, &Options::default()).unwrap().to_string()
  }

  fn is_valid(abbr: &str) -> bool {
    TagGrammar.parse(abbr, &Options::default()).is_ok()
  }

  #[test]
  fn valid_abbreviations() {
    for abbr in [
      "div",
      "ul>li",
      "ul>li*3",
      ".a.b#c",
      "[]",
      "a[href=x title='y z']",
      "p{hi}",
      "()",
      "(a+b)*2",
      "div>p^span",
      "!",
      // still being typed
      ".",
      "a#",
    ] {
      assert!(is_valid(abbr), "{abbr} should parse");
    }
  }

  #[test]
  fn invalid_abbreviations() {
    for abbr in [
      "", "div+", "div>", "div(", "div(+)", "a[b(+)]", "ul\nli", "a b", "(a", "a)", "a*", "a*0",
      "p{x", "<p", ".+a",
    ] {
      assert!(!is_valid(abbr), "{abbr:?} should not parse");
    }
  }

  #[test]
  fn error_positions() {
    let err = TagGrammar.parse("div+", &Options::default()).unwrap_err();
    assert_eq!(err.pos, 4);
    let err = TagGrammar.parse("div(", &Options::default()).unwrap_err();
    assert_eq!(err.pos, 3);
  }

  #[test]
  fn expansion() {
    assert_eq!(expand("div"), "<div>${1}</div>");
    assert_eq!(expand("ul>li*2"), "<ul><li>${1}</li><li>${2}</li></ul>");
    assert_eq!(expand(".a#b"), "<div id=\"b\" class=\"a\">${1}</div>");
    assert_eq!(expand("a[href]{x}"), "<a href=\"${1}\">x</a>");
    assert_eq!(expand("ul>.item"), "<ul><li class=\"item\">${1}</li></ul>");
    assert_eq!(expand("div>p^span"), "<div><p>${1}</p></div><span>${2}</span>");
    assert_eq!(expand("img+br"), "<img><br>");
  }

  #[test]
  fn empty_group_expands_to_nothing() {
    let ast = TagGrammar.parse("()", &Options::default()).unwrap();
    assert_eq!(
      TagGrammar.expand(&ast, &Options::default()),
      Err(ExpandError::Empty)
    );
  }

  #[test]
  fn context_resolves_implicit_names() {
    let options = Options {
      context: Some(Context {
        name:       "ul".into(),
        attributes: SmallVec::new(),
      }),
      ..Options::default()
    };
    let ast = TagGrammar.parse(".x", &options).unwrap();
    assert_eq!(
      TagGrammar.expand(&ast, &options).unwrap().as_str(),
      "<li class=\"x\">${1}</li>"
    );
  }

  #[test]
  fn extract_left_of_caret() {
    let options = Options::default();
    let found = TagGrammar.extract("  <p>ul>li x", 10, &options).unwrap();
    assert_eq!(found.abbreviation.as_str(), "ul>li");
    assert_eq!((found.start, found.end, found.location), (5, 10, 5));

    let found = TagGrammar.extract("foo bar", 3, &options).unwrap();
    assert_eq!(found.abbreviation.as_str(), "foo");
    assert!(TagGrammar.extract("foo ", 4, &options).is_none());
  }

  #[test]
  fn extract_with_prefix() {
    let options = Options {
      prefix: Some("<".into()),
      ..Options::default()
    };
    let found = TagGrammar.extract("return <ul>li", 13, &options).unwrap();
    assert_eq!(found.abbreviation.as_str(), "ul>li");
    assert_eq!((found.start, found.location), (7, 8));
    assert!(TagGrammar.extract("return ul", 9, &options).is_none());
  }

  #[test]
  fn capture_nearest_open_element() {
    let text = Rope::from("<ul class=\"nav\"><li>a</li><br/>");
    let context = TagGrammar
      .capture_context(&text, text.len_chars(), &SyntaxId::new("html"))
      .unwrap();
    assert_eq!(context.name.as_str(), "ul");
    assert_eq!(context.attributes.as_slice(), &[(
      Tendril::from("class"),
      Some(Tendril::from("nav"))
    )]);
    assert!(
      TagGrammar
        .capture_context(&text, 0, &SyntaxId::new("html"))
        .is_none()
    );
    assert!(
      TagGrammar
        .capture_context(&text, text.len_chars(), &SyntaxId::new("css"))
        .is_none()
    );
  }
}
