//! Python bindings.
//!
//! Exposes the component tree so Python code can build and render markup
//! with the same output as the Rust builder.
//!
//! A Python `Node` holds its child nodes by reference, the way Python objects
//! normally alias. Changing a child after adding it shows up in the parent's
//! next render, and adding one node to two parents renders it in both.

use pyo3::exceptions::{PyRecursionError, PyTypeError};
use pyo3::prelude::*;

use crate::tree::Node;

/// Deepest nesting `render()` will follow. Hitting it means the tree has a
/// cycle or is unreasonably deep.
const MAX_DEPTH: usize = 512;

enum PyChild {
    Node(Py<PyNode>),
    Text(String),
}

/// Python-exposed element.
///
/// Builder methods mutate in place and return the same object so calls can
/// be chained: `Node("div").cls("card").add("hi").render()`.
#[pyclass(name = "Node")]
pub struct PyNode {
    /// Tag, classes and attributes. Children live in `children`.
    element: Node,
    children: Vec<PyChild>,
}

#[pymethods]
impl PyNode {
    #[new]
    #[pyo3(signature = (tag, content = None))]
    fn new(tag: String, content: Option<&Bound<'_, PyAny>>) -> PyResult<Self> {
        let mut node = Self {
            element: Node::new(tag),
            children: Vec::new(),
        };
        if let Some(content) = content {
            node.push_py(content)?;
        }
        Ok(node)
    }

    /// Add a CSS class.
    fn cls(mut slf: PyRefMut<'_, Self>, class: String) -> PyRefMut<'_, Self> {
        slf.element.add_class(class);
        slf
    }

    fn attr(mut slf: PyRefMut<'_, Self>, name: String, value: String) -> PyRefMut<'_, Self> {
        slf.element.set_attr(name, value);
        slf
    }

    fn id(mut slf: PyRefMut<'_, Self>, id: String) -> PyRefMut<'_, Self> {
        slf.element.set_attr("id", id);
        slf
    }

    /// Append a child node or a text string.
    fn add<'py>(
        mut slf: PyRefMut<'py, Self>,
        child: &Bound<'py, PyAny>,
    ) -> PyResult<PyRefMut<'py, Self>> {
        slf.push_py(child)?;
        Ok(slf)
    }

    #[getter]
    fn tag(&self) -> String {
        self.element.tag().to_string()
    }

    fn render(&self, py: Python<'_>) -> PyResult<String> {
        Ok(self.resolve(py, 0)?.render())
    }

    fn __str__(&self, py: Python<'_>) -> PyResult<String> {
        self.render(py)
    }

    fn __repr__(&self) -> String {
        format!(
            "Node(tag={:?}, children={})",
            self.element.tag(),
            self.children.len()
        )
    }
}

impl PyNode {
    fn push_py(&mut self, child: &Bound<'_, PyAny>) -> PyResult<()> {
        if let Ok(node) = child.downcast::<PyNode>() {
            self.children.push(PyChild::Node(node.clone().unbind()));
        } else if let Ok(text) = child.extract::<String>() {
            self.children.push(PyChild::Text(text));
        } else {
            return Err(PyTypeError::new_err("child must be a Node or a str"));
        }
        Ok(())
    }

    /// Build a Rust tree from the current state of this node and every node
    /// it references.
    fn resolve(&self, py: Python<'_>, depth: usize) -> PyResult<Node> {
        if depth > MAX_DEPTH {
            return Err(PyRecursionError::new_err(
                "node tree is cyclic or nested too deeply",
            ));
        }
        let mut node = self.element.clone();
        for child in &self.children {
            match child {
                PyChild::Node(handle) => {
                    let resolved = handle.bind(py).try_borrow()?.resolve(py, depth + 1)?;
                    node.push(resolved);
                }
                PyChild::Text(text) => node.push(text.as_str()),
            }
        }
        Ok(node)
    }
}

/// Python module definition.
#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyNode>()?;
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    Ok(())
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
