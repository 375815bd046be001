//! Parsers for the XML documents answered by S3
use log::debug;
use quick_xml::{events::Event, Reader};

use super::ObjectRecord;
use crate::error::Error;

/// One page of a ListObjectsV2 response
#[derive(Debug, Default, PartialEq)]
pub(crate) struct ListPage {
    pub objects: Vec<ObjectRecord>,
    pub common_prefixes: Vec<String>,
    pub is_truncated: bool,
    pub next_continuation_token: Option<String>,
}

enum Node<'a> {
    Text(&'a [Vec<u8>], String),
    Close(&'a [Vec<u8>]),
}

fn ends_with(path: &[Vec<u8>], tail: &[&str]) -> bool {
    path.len() >= tail.len()
        && path[path.len() - tail.len()..]
            .iter()
            .zip(tail)
            .all(|(p, t)| p.as_slice() == t.as_bytes())
}

/// Visit the text and closing tags of a document with the path of the enclosing elements
fn walk<F>(body: &str, mut visit: F) -> Result<(), Error>
where
    F: FnMut(Node) -> Result<(), Error>,
{
    let mut reader = Reader::from_str(body);
    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut buf = Vec::new();
    loop {
        match reader.read_event(&mut buf) {
            Ok(Event::Start(ref e)) => stack.push(e.name().to_vec()),
            Ok(Event::End(_)) => {
                visit(Node::Close(&stack))?;
                stack.pop();
            }
            Ok(Event::Text(e)) => {
                let text = e.unescape_and_decode(&reader)?;
                visit(Node::Text(&stack, text))?;
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.into()),
            _ => (),
        }
        buf.clear();
    }
    Ok(())
}

pub(crate) fn list_objects_v2_parser(body: &str) -> Result<ListPage, Error> {
    let mut page = ListPage::default();
    let mut key = String::new();
    let mut size = 0u64;
    walk(body, |node| {
        match node {
            Node::Text(path, text) => {
                if ends_with(path, &["Contents", "Key"]) {
                    key = text;
                } else if ends_with(path, &["Contents", "Size"]) {
                    size = text
                        .trim()
                        .parse()
                        .map_err(|_| Error::UserError("object size is not a number"))?;
                } else if ends_with(path, &["CommonPrefixes", "Prefix"]) {
                    page.common_prefixes.push(text);
                } else if ends_with(path, &["ListBucketResult", "IsTruncated"]) {
                    page.is_truncated = text.trim() == "true";
                } else if ends_with(path, &["ListBucketResult", "NextContinuationToken"]) {
                    page.next_continuation_token = Some(text);
                }
            }
            Node::Close(path) => {
                if ends_with(path, &["ListBucketResult", "Contents"]) {
                    page.objects
                        .push(ObjectRecord::new(std::mem::take(&mut key), size));
                    size = 0;
                }
            }
        }
        Ok(())
    })?;
    Ok(page)
}

/// The region of a bucket, an empty constraint is the classic us-east-1
pub(crate) fn location_xml_parser(body: &str) -> Result<Option<String>, Error> {
    let mut location = None;
    walk(body, |node| {
        if let Node::Text(path, text) = node {
            if ends_with(path, &["LocationConstraint"]) && !text.trim().is_empty() {
                location = Some(text.trim().to_string());
            }
        }
        Ok(())
    })?;
    Ok(location)
}

/// The `Code` and `Message` of an error document
pub(crate) fn error_xml_parser(body: &str) -> (String, String) {
    let mut code = String::new();
    let mut message = String::new();
    let parsed = walk(body, |node| {
        if let Node::Text(path, text) = node {
            if ends_with(path, &["Error", "Code"]) {
                code = text;
            } else if ends_with(path, &["Error", "Message"]) {
                message = text;
            }
        }
        Ok(())
    });
    if let Err(e) = parsed {
        debug!("error document is not valid xml: {}", e);
    }
    (code, message)
}
