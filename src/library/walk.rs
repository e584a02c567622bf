//!
//! The link-time dependency graph walk.
//!

use crate::dependency::BufferDependency;
use crate::dependency::Dependency;
use crate::dependency::DependencyKey;
use crate::dependency::FileDependency;
use crate::dependency::SourceKind;
use crate::library::CodeLibrary;

///
/// The node of the linearized dependency graph.
///
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    /// A code library, the walk root included.
    Library(&'a CodeLibrary),
    /// A file dependency.
    File(&'a FileDependency),
    /// A buffer dependency.
    Buffer(&'a BufferDependency),
}

impl<'a> Node<'a> {
    ///
    /// Returns the identity used to remove duplicates.
    ///
    pub fn key(&self) -> DependencyKey {
        match self {
            Self::Library(library) => DependencyKey::Library(library.id()),
            Self::File(file) => file.key(),
            Self::Buffer(buffer) => buffer.key(),
        }
    }

    ///
    /// Returns the leaf kind, or `None` for a library.
    ///
    pub fn kind(&self) -> Option<SourceKind> {
        match self {
            Self::Library(_) => None,
            Self::File(file) => Some(file.kind),
            Self::Buffer(buffer) => Some(buffer.kind),
        }
    }
}

///
/// Linearizes the dependency tree of `library`.
///
/// In pre-order, a library precedes its dependencies; in post-order, it follows them.
/// Dependencies keep their insertion order, and a library reachable along several paths is
/// visited once per path. The graph is acyclic, since only finalized libraries can be added
/// as dependencies.
///
pub fn walk(library: &CodeLibrary, post_order: bool) -> Vec<Node<'_>> {
    let mut nodes = Vec::new();
    visit(library, post_order, &mut nodes);
    nodes
}

fn visit<'a>(library: &'a CodeLibrary, post_order: bool, nodes: &mut Vec<Node<'a>>) {
    if !post_order {
        nodes.push(Node::Library(library));
    }
    for dependency in library.dependencies() {
        match dependency {
            Dependency::Library(nested) => visit(nested.as_ref(), post_order, nodes),
            Dependency::File(file) => nodes.push(Node::File(file)),
            Dependency::Buffer(buffer) => nodes.push(Node::Buffer(buffer)),
        }
    }
    if post_order {
        nodes.push(Node::Library(library));
    }
}
