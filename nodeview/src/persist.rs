//! Builder-style XML save and load for a [`GraphView`].
//!
//! ```xml
//! <interface>
//!   <object class="adder" id="0">
//!     <property name="label">Adder</property>
//!     <property name="x">10</property>
//!     <custom>...</custom>
//!     <signal name="node-socket-connect" handler="1_0" object="2"/>
//!   </object>
//! </interface>
//! ```
//!
//! Links are written inside the object of the node owning the source socket.
//! The handler names the source and sink socket ids, `object` the sink node.

use std::collections::HashMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use emath::{pos2, vec2};
use log::{debug, info, warn};
use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::error::ViewError;
use crate::node::{Node, NodeId};
use crate::registry::NodeRegistry;
use crate::socket::{SocketId, SocketMode};
use crate::view::GraphView;

const CONNECT_SIGNAL: &str = "node-socket-connect";

/// A signal read before every object is known.
struct PendingLink {
    source_node: u32,
    handler: String,
    sink_node: u32,
}

fn parse_handler(handler: &str) -> Result<(SocketId, SocketId), ViewError> {
    let invalid = || ViewError::InvalidHandler(handler.to_string());
    let (source, sink) = handler.split_once('_').ok_or_else(invalid)?;
    let source = source.parse().map_err(|_| invalid())?;
    let sink = sink.parse().map_err(|_| invalid())?;
    Ok((SocketId(source), SocketId(sink)))
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ViewError> {
    value.parse().map_err(|_| ViewError::InvalidProperty {
        name: name.to_string(),
        value: value.to_string(),
    })
}

fn attribute(element: &BytesStart, key: &[u8]) -> Result<Option<String>, ViewError> {
    for attr in element.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == key {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

fn required_attribute(element: &BytesStart, key: &[u8]) -> Result<String, ViewError> {
    attribute(element, key)?.ok_or_else(|| {
        ViewError::Malformed(format!(
            "<{}> is missing the {} attribute",
            String::from_utf8_lossy(element.name().as_ref()),
            String::from_utf8_lossy(key)
        ))
    })
}

fn properties(node: &Node) -> Vec<(&'static str, String)> {
    let rect = node.rect();
    let padding = node.padding();
    vec![
        ("label", node.label().to_string()),
        ("expanded", node.is_expanded().to_string()),
        ("x", rect.min.x.to_string()),
        ("y", rect.min.y.to_string()),
        ("width", rect.width().to_string()),
        ("height", rect.height().to_string()),
        ("id", node.id().0.to_string()),
        ("padding-left", padding.left.to_string()),
        ("padding-right", padding.right.to_string()),
        ("padding-top", padding.top.to_string()),
        ("padding-bottom", padding.bottom.to_string()),
        ("socket-radius", node.socket_radius().to_string()),
    ]
}

impl GraphView {
    /// Write the view as XML. Node ids are reassigned densely, in z-order,
    /// before writing.
    pub fn save<W: Write>(&mut self, writer: W) -> Result<(), ViewError> {
        self.renumber_nodes();
        let mut xml = Writer::new_with_indent(writer, b' ', 2);
        xml.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        xml.write_event(Event::Start(BytesStart::new("interface")))?;

        for node in self.nodes() {
            let id = node.id().0.to_string();
            xml.write_event(Event::Start(
                BytesStart::new("object").with_attributes([("class", node.class()), ("id", id.as_str())]),
            ))?;

            for (name, value) in properties(node) {
                xml.write_event(Event::Start(BytesStart::new("property").with_attributes([("name", name)])))?;
                xml.write_event(Event::Text(BytesText::new(&value)))?;
                xml.write_event(Event::End(BytesEnd::new("property")))?;
            }

            if let Some(fragment) = node.custom().and_then(|c| c.export_xml()) {
                xml.write_event(Event::Start(BytesStart::new("custom")))?;
                xml.write_event(Event::Text(BytesText::from_escaped(fragment.as_str())))?;
                xml.write_event(Event::End(BytesEnd::new("custom")))?;
            }

            for link in self.links() {
                let (Some(source), Some(sink)) = (self.sockets().get(link.source), self.sockets().get(link.sink))
                else {
                    continue;
                };
                if source.owner() != node.id() {
                    continue;
                }
                let handler = format!("{}_{}", source.id().0, sink.id().0);
                let object = sink.owner().0.to_string();
                xml.write_event(Event::Empty(BytesStart::new("signal").with_attributes([
                    ("name", CONNECT_SIGNAL),
                    ("handler", handler.as_str()),
                    ("object", object.as_str()),
                ])))?;
            }

            xml.write_event(Event::End(BytesEnd::new("object")))?;
        }

        xml.write_event(Event::End(BytesEnd::new("interface")))?;
        xml.into_inner().flush()?;
        info!("Saved {} nodes and {} links", self.nodes().len(), self.links().len());
        Ok(())
    }

    pub fn save_to_string(&mut self) -> Result<String, ViewError> {
        let mut buffer = Vec::new();
        self.save(&mut buffer)?;
        String::from_utf8(buffer).map_err(|e| ViewError::Malformed(e.to_string()))
    }

    pub fn save_to_path(&mut self, path: impl AsRef<Path>) -> Result<(), ViewError> {
        let file = fs::File::create(path.as_ref())?;
        self.save(BufWriter::new(file))
    }

    /// Like [`save_to_path`](Self::save_to_path), logging failure instead of
    /// returning it.
    pub fn try_save_to_path(&mut self, path: impl AsRef<Path>) -> bool {
        match self.save_to_path(path.as_ref()) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to save graph to {:?}: {}", path.as_ref(), e);
                false
            }
        }
    }

    pub fn load_from_path(
        &mut self,
        path: impl AsRef<Path>,
        registry: &NodeRegistry,
    ) -> Result<Vec<NodeId>, ViewError> {
        let content = fs::read_to_string(path)?;
        self.load(&content, registry)
    }

    /// Add the nodes and links described by `xml` to this view. Nodes are
    /// built through `registry`; an unregistered class aborts the load.
    /// Returns the ids of the new nodes in document order.
    pub fn load(&mut self, xml: &str, registry: &NodeRegistry) -> Result<Vec<NodeId>, ViewError> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut created = Vec::new();
        let mut file_ids: HashMap<u32, NodeId> = HashMap::new();
        let mut pending = Vec::new();
        let mut current: Option<(u32, NodeId)> = None;

        loop {
            match reader.read_event()? {
                Event::Eof => break,
                Event::Start(e) if e.name().as_ref() == b"object" => {
                    let (file_id, id) = self.build_object(&e, registry)?;
                    created.push(id);
                    current = Some((file_id, id));
                }
                Event::Empty(e) if e.name().as_ref() == b"object" => {
                    let (file_id, id) = self.build_object(&e, registry)?;
                    created.push(id);
                    file_ids.insert(file_id, id);
                    self.with_node(id, |node, sockets| node.layout(sockets));
                }
                Event::End(e) if e.name().as_ref() == b"object" => {
                    if let Some((file_id, id)) = current.take() {
                        file_ids.insert(file_id, id);
                        self.with_node(id, |node, sockets| node.layout(sockets));
                    }
                }
                Event::Start(e) if e.name().as_ref() == b"property" => {
                    let name = required_attribute(&e, b"name")?;
                    let raw = reader.read_text(e.name())?;
                    let value = quick_xml::escape::unescape(&raw).map_err(quick_xml::Error::from)?;
                    let Some((file_id, id)) = current else {
                        return Err(ViewError::Malformed(format!("property {} outside an object", name)));
                    };
                    let id = self.apply_property(id, &name, value.trim())?;
                    current = Some((file_id, id));
                }
                Event::Start(e) if e.name().as_ref() == b"custom" => {
                    let fragment = reader.read_text(e.name())?;
                    let Some((_, id)) = current else {
                        return Err(ViewError::Malformed("custom fragment outside an object".into()));
                    };
                    let imported = self.with_node(id, |node, _| match node.custom_mut() {
                        Some(state) => state.import_xml(fragment.trim()),
                        None => {
                            debug!("Node {:?} has no custom state, ignoring fragment", id);
                            Ok(())
                        }
                    });
                    imported.transpose()?;
                }
                Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"signal" => {
                    let name = required_attribute(&e, b"name")?;
                    if name != CONNECT_SIGNAL {
                        debug!("Skipping unknown signal {}", name);
                        continue;
                    }
                    let Some((file_id, _)) = current else {
                        return Err(ViewError::Malformed("signal outside an object".into()));
                    };
                    pending.push(PendingLink {
                        source_node: file_id,
                        handler: required_attribute(&e, b"handler")?,
                        sink_node: parse_number("object", &required_attribute(&e, b"object")?)?,
                    });
                }
                _ => {}
            }
        }

        for link in pending {
            self.resolve_link(&link, &file_ids)?;
        }
        info!("Loaded {} nodes", created.len());
        Ok(created)
    }

    fn build_object(&mut self, element: &BytesStart, registry: &NodeRegistry) -> Result<(u32, NodeId), ViewError> {
        let class = required_attribute(element, b"class")?;
        let file_id = parse_number("id", &required_attribute(element, b"id")?)?;
        let id = registry.build(&class, self)?;
        debug!("Loading {} object {} as node {:?}", class, file_id, id);
        Ok((file_id, id))
    }

    fn apply_property(&mut self, id: NodeId, name: &str, value: &str) -> Result<NodeId, ViewError> {
        if name == "id" {
            return self
                .try_assign_id(id, NodeId(parse_number(name, value)?))
                .ok_or_else(|| ViewError::InvalidProperty {
                    name: name.to_string(),
                    value: value.to_string(),
                });
        }
        let number = || parse_number::<f32>(name, value);
        let result: Option<Result<(), ViewError>> = match name {
            "label" => self.with_node(id, |node, _| {
                node.set_label(value);
                Ok(())
            }),
            "expanded" => {
                let expanded = parse_number::<bool>(name, value)?;
                self.with_node(id, |node, _| {
                    node.set_expanded(expanded);
                    Ok(())
                })
            }
            "x" | "y" => {
                let v = number()?;
                self.with_node(id, |node, _| {
                    let p = node.position();
                    node.set_position(if name == "x" { pos2(v, p.y) } else { pos2(p.x, v) });
                    Ok(())
                })
            }
            "width" | "height" => {
                let v = number()?;
                self.with_node(id, |node, _| {
                    let s = node.size();
                    node.set_size(if name == "width" { vec2(v, s.y) } else { vec2(s.x, v) });
                    Ok(())
                })
            }
            "padding-left" | "padding-right" | "padding-top" | "padding-bottom" => {
                let v = number()?.max(0.0);
                self.with_node(id, |node, _| {
                    let mut padding = node.padding();
                    match name {
                        "padding-left" => padding.left = v,
                        "padding-right" => padding.right = v,
                        "padding-top" => padding.top = v,
                        _ => padding.bottom = v,
                    }
                    node.set_padding(padding);
                    Ok(())
                })
            }
            "socket-radius" => {
                let v = number()?;
                self.with_node(id, |node, sockets| {
                    node.set_socket_radius(sockets, v);
                    Ok(())
                })
            }
            _ => {
                debug!("Ignoring unknown property {}", name);
                Some(Ok(()))
            }
        };
        result.ok_or(ViewError::UnknownNode(id.0))??;
        Ok(id)
    }

    fn resolve_link(&mut self, link: &PendingLink, file_ids: &HashMap<u32, NodeId>) -> Result<(), ViewError> {
        let (source_id, sink_id) = parse_handler(&link.handler)?;
        let lookup = |file_id: u32| file_ids.get(&file_id).copied().ok_or(ViewError::UnknownNode(file_id));
        let source_node = lookup(link.source_node)?;
        let sink_node = lookup(link.sink_node)?;

        let source = self
            .node(source_node)
            .and_then(|n| n.socket_by_id(self.sockets(), source_id, SocketMode::Source))
            .ok_or_else(|| ViewError::Malformed(format!("no source socket {:?} on node {:?}", source_id, source_node)))?;
        let sink = self
            .node(sink_node)
            .and_then(|n| n.socket_by_id(self.sockets(), sink_id, SocketMode::Sink))
            .ok_or_else(|| ViewError::Malformed(format!("no sink socket {:?} on node {:?}", sink_id, sink_node)))?;

        self.connect(sink, source)?;
        Ok(())
    }
}
