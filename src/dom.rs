//! HTML document parsing, resource enumeration and URL rewriting.
//!
//! Built on `html5ever` + `markup5ever_rcdom`: parsing produces a tree of
//! `Rc<Node>` handles that stay valid (and mutable, via interior
//! `RefCell`s) for the lifetime of the owning [`HtmlDocument`]. This is what
//! lets the save stage hold onto the exact elements discovered during
//! parsing and mutate their attributes later, once the targets' save paths
//! are known.

use html5ever::serialize::{SerializeOpts, TraversalScope, serialize};
use html5ever::tendril::TendrilSink;
use html5ever::{ParseOpts, local_name, parse_document};
use markup5ever_rcdom::{Handle, NodeData, RcDom, SerializableHandle};
use thiserror::Error;

/// Kind of resource a DOM element refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Link,
    Stylesheet,
    Script,
    Image,
}

/// A handle into the owning document's DOM tree plus the attribute that
/// carries the resource's URL. Stable for the document's lifetime.
#[derive(Clone)]
pub struct ElementHandle {
    node: Handle,
    attr: &'static str,
}

impl ElementHandle {
    fn new(node: Handle, attr: &'static str) -> Self {
        Self { node, attr }
    }
}

#[derive(Debug, Error)]
pub enum DomError {
    #[error("failed to serialize document: {0}")]
    Serialize(#[from] std::io::Error),
}

/// A parsed HTML document, owning its DOM tree.
pub struct HtmlDocument {
    dom: RcDom,
}

/// One resource-bearing element discovered during enumeration.
pub struct Resource {
    pub handle: ElementHandle,
    pub kind: ResourceKind,
    pub raw_url: String,
}

impl HtmlDocument {
    /// Parses `bytes` as HTML. `html5ever`'s tree builder never rejects
    /// input outright (it recovers per the HTML5 spec), so this only fails
    /// if the byte stream itself can't be read.
    pub fn parse(bytes: &[u8]) -> Result<Self, DomError> {
        let dom = parse_document(RcDom::default(), ParseOpts::default())
            .from_utf8()
            .read_from(&mut { bytes })?;
        Ok(Self { dom })
    }

    /// Enumerates resource-bearing elements in document order via a single
    /// depth-first traversal.
    pub fn enumerate_resources(&self) -> Vec<Resource> {
        let mut out = Vec::new();
        walk(&self.dom.document, &mut out);
        out
    }

    /// Overwrites the URL attribute on `handle` with `new_value`.
    pub fn set_url(&self, handle: &ElementHandle, new_value: &str) {
        if let NodeData::Element { attrs, .. } = &handle.node.data {
            let mut attrs = attrs.borrow_mut();
            if let Some(attr) = attrs.iter_mut().find(|a| &*a.name.local == handle.attr) {
                attr.value = new_value.to_string().into();
            }
        }
    }

    /// Re-serializes the document to bytes, reflecting any prior `set_url`
    /// calls.
    pub fn serialize(&self) -> Result<Vec<u8>, DomError> {
        let mut out = Vec::new();
        let handle: SerializableHandle = self.dom.document.clone().into();
        serialize(
            &mut out,
            &handle,
            SerializeOpts {
                traversal_scope: TraversalScope::ChildrenOnly(None),
                ..Default::default()
            },
        )?;
        Ok(out)
    }
}

fn walk(node: &Handle, out: &mut Vec<Resource>) {
    if let NodeData::Element { name, attrs, .. } = &node.data {
        let tag = &*name.local;
        let attrs = attrs.borrow();

        let classified = match tag {
            "a" => attrs
                .iter()
                .find(|a| a.name.local == local_name!("href"))
                .map(|a| (ResourceKind::Link, "href", a.value.to_string())),
            "link" => {
                let is_stylesheet = attrs
                    .iter()
                    .any(|a| a.name.local == local_name!("type") && &*a.value == "text/css")
                    || attrs
                        .iter()
                        .any(|a| a.name.local == local_name!("rel") && &*a.value == "stylesheet");
                if is_stylesheet {
                    attrs
                        .iter()
                        .find(|a| a.name.local == local_name!("href"))
                        .map(|a| (ResourceKind::Stylesheet, "href", a.value.to_string()))
                } else {
                    None
                }
            }
            "script" => attrs
                .iter()
                .find(|a| a.name.local == local_name!("src"))
                .map(|a| (ResourceKind::Script, "src", a.value.to_string())),
            "img" => attrs
                .iter()
                .find(|a| a.name.local == local_name!("src"))
                .map(|a| (ResourceKind::Image, "src", a.value.to_string())),
            _ => None,
        };
        drop(attrs);

        if let Some((kind, attr, raw_url)) = classified {
            out.push(Resource {
                handle: ElementHandle::new(node.clone(), attr),
                kind,
                raw_url,
            });
        }
    }

    for child in node.children.borrow().iter() {
        walk(child, out);
    }
}
