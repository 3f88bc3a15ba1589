use std::collections::HashSet;

use super::{Json, NodeId, Value};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("JSON node {node:?}: {problem}")]
pub struct CheckError {
    pub node: NodeId,
    pub problem: &'static str,
}

impl Json {
    /// Walks the subtree at `id` and reports the first structural problem:
    /// broken sibling links, children not pointing back at their parent,
    /// keys on array elements, missing keys on object members, or cycles.
    pub fn check(&self, id: NodeId) -> Result<(), CheckError> {
        let mut seen = HashSet::new();
        self.check_node(id, &mut seen)
    }

    fn check_node(&self, id: NodeId, seen: &mut HashSet<NodeId>) -> Result<(), CheckError> {
        let problem = |problem| CheckError { node: id, problem };

        if !seen.insert(id) {
            return Err(problem("node is reachable twice (cycle)"));
        }
        let node = self.node(id).map_err(|_| problem("node does not exist"))?;

        if !node.value.is_container() {
            if node.head.is_some() || node.tail.is_some() {
                return Err(problem("scalar node has children"));
            }
            return Ok(());
        }

        match (node.head, node.tail) {
            (None, None) => return Ok(()),
            (None, Some(_)) => return Err(problem("head is empty, but tail is not")),
            (Some(_), None) => return Err(problem("tail is empty, but head is not")),
            (Some(_), Some(_)) => {}
        }

        let mut prev: Option<NodeId> = None;
        let mut cursor = node.head;
        while let Some(child_id) = cursor {
            if child_id == id {
                return Err(problem("node is its own child"));
            }
            let child = self
                .node(child_id)
                .map_err(|_| problem("child does not exist"))?;

            if child.parent != Some(id) {
                return Err(problem("child does not point back to parent"));
            }
            if child.prev != prev {
                return Err(problem("child's prev link does not match its sibling"));
            }
            match (&node.value, &child.key) {
                (Value::Array, Some(_)) => return Err(problem("array element has a key")),
                (Value::Object, None) => return Err(problem("object member has no key")),
                _ => {}
            }

            self.check_node(child_id, seen)?;

            prev = Some(child_id);
            cursor = child.next;
        }

        if prev != node.tail {
            return Err(problem(
                "tail does not match the node found by following next links from head",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::json::{decode, Json};

    #[test]
    fn accepts_well_formed_trees() {
        let doc = decode(r#"{"a":[1,[2,{"b":[]}]],"c":{}}"#).unwrap();
        doc.check(doc.root().unwrap()).unwrap();
    }

    #[test]
    fn detects_broken_links() {
        let mut doc = Json::new();
        let arr = doc.new_array();
        let a = doc.new_null();
        let b = doc.new_null();
        doc.append_element(arr, a).unwrap();
        doc.append_element(arr, b).unwrap();

        doc.node_mut(b).unwrap().prev = None;
        let err = doc.check(arr).unwrap_err();
        assert_eq!(err.problem, "child's prev link does not match its sibling");

        doc.node_mut(b).unwrap().prev = Some(a);
        doc.node_mut(a).unwrap().key = Some("k".into());
        let err = doc.check(arr).unwrap_err();
        assert_eq!(err.problem, "array element has a key");
    }

    #[test]
    fn detects_tail_mismatch() {
        let mut doc = Json::new();
        let obj = doc.new_object();
        let a = doc.new_null();
        let b = doc.new_null();
        doc.append_member(obj, "a", a).unwrap();
        doc.append_member(obj, "b", b).unwrap();
        doc.node_mut(obj).unwrap().tail = Some(a);
        assert!(doc.check(obj).is_err());
    }
}
