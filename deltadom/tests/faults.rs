//! Runs that must abort.

use deltadom::{
    Attribute, DiffError, DifferenceHandler, Document, ElementData, Fault, NodeKind, Position,
    Recorder, Selector, diff, parse_document, parse_fragment,
};
use deltadom::indextree::NodeId;
use facet_testhelpers::test;

fn fault_between(before: &mut Document, after: &Document) -> Fault {
    match diff(before, after, Recorder::new()) {
        Err(DiffError::Fault(fault)) => fault,
        Err(DiffError::Sink(never)) => match never {},
        Ok(recorder) => panic!("expected a fault, got {:#?}", recorder.operations),
    }
}

// HTML parsing turns `<![CDATA[` and `<?` into comments, so documents
// carrying the unsupported kinds are built by hand.

fn element(doc: &mut Document, parent: NodeId, tag: &str) -> NodeId {
    doc.append(parent, NodeKind::Element(ElementData::new(tag))).unwrap()
}

fn text(doc: &mut Document, parent: NodeId, value: &str) {
    doc.append(parent, NodeKind::Text(value.to_string())).unwrap();
}

fn cdata(doc: &mut Document, parent: NodeId, value: &str) {
    doc.append(parent, NodeKind::CData(value.to_string())).unwrap();
}

/// `<div><![CDATA[{content}]]></div><p>{paragraph}</p>`
fn nested_cdata(content: &str, paragraph: &str) -> Document {
    let mut doc = Document::fragment();
    let root = doc.root;
    let div = element(&mut doc, root, "div");
    cdata(&mut doc, div, content);
    let p = element(&mut doc, root, "p");
    text(&mut doc, p, paragraph);
    doc
}

#[test]
fn cdata_sections_are_unsupported() {
    let mut before = Document::fragment();
    let mut after = Document::fragment();
    let root = after.root;
    cdata(&mut after, root, "after");

    let fault = fault_between(&mut before, &after);
    assert!(matches!(fault, Fault::UnsupportedNodeKind { .. }), "{fault:?}");
}

#[test]
fn processing_instructions_are_unsupported() {
    let mut before = Document::fragment();
    let mut after = Document::fragment();
    let root = after.root;
    after
        .append(
            root,
            NodeKind::ProcessingInstruction {
                target: "test".into(),
                data: "after".to_string(),
            },
        )
        .unwrap();

    let fault = fault_between(&mut before, &after);
    assert!(matches!(fault, Fault::UnsupportedNodeKind { .. }), "{fault:?}");
}

#[test]
fn unsupported_nodes_on_the_before_side_fault_too() {
    let mut before = parse_fragment("<p>a</p>");
    let root = before.root;
    cdata(&mut before, root, "before");
    let after = parse_fragment("<p>a</p>");

    let fault = fault_between(&mut before, &after);
    assert!(matches!(fault, Fault::UnsupportedNodeKind { .. }), "{fault:?}");
}

#[test]
fn nested_cdata_with_new_content_faults() {
    let mut before = nested_cdata("a", "1");
    let after = nested_cdata("b", "2");

    let fault = fault_between(&mut before, &after);
    assert!(matches!(fault, Fault::UnsupportedNodeKind { .. }), "{fault:?}");
}

#[test]
fn identical_nested_cdata_is_left_alone() {
    let mut before = nested_cdata("a", "1");
    let after = nested_cdata("a", "2");

    diff(&mut before, &after, Recorder::new()).unwrap();
    assert_eq!(before.snapshot(), after.snapshot());
}

#[test]
fn doctype_changes_are_unsupported() {
    let mut before = parse_document("<!DOCTYPE html><html></html>");
    let after = parse_document("<!DOCTYPE svg><html></html>");
    let err = diff(&mut before, &after, Recorder::new()).unwrap_err();
    assert!(matches!(
        err,
        DiffError::Fault(Fault::UnsupportedNodeKind { .. })
    ));
    assert!(err.to_string().starts_with("diff aborted"));
}

/// Accepts a fixed number of operations, then fails.
#[derive(Debug)]
struct Quota {
    left: usize,
    seen: Recorder,
}

#[derive(Debug, PartialEq)]
struct OutOfQuota;

impl Quota {
    fn spend(&mut self) -> Result<(), OutOfQuota> {
        if self.left == 0 {
            return Err(OutOfQuota);
        }
        self.left -= 1;
        Ok(())
    }
}

impl DifferenceHandler for Quota {
    type Error = OutOfQuota;

    fn delete_node(&mut self, position: Position) -> Result<(), OutOfQuota> {
        self.spend()?;
        let _ = self.seen.delete_node(position);
        Ok(())
    }

    fn delete_element(&mut self, element: Selector) -> Result<(), OutOfQuota> {
        self.spend()?;
        let _ = self.seen.delete_element(element);
        Ok(())
    }

    fn insert_comment(&mut self, position: Position, text: &str) -> Result<(), OutOfQuota> {
        self.spend()?;
        let _ = self.seen.insert_comment(position, text);
        Ok(())
    }

    fn insert_text(&mut self, position: Position, text: &str) -> Result<(), OutOfQuota> {
        self.spend()?;
        let _ = self.seen.insert_text(position, text);
        Ok(())
    }

    fn insert_element(
        &mut self,
        position: Position,
        tag: &str,
        attrs: &[Attribute],
    ) -> Result<(), OutOfQuota> {
        self.spend()?;
        let _ = self.seen.insert_element(position, tag, attrs);
        Ok(())
    }

    fn move_node(&mut self, from: Position, to: Position) -> Result<(), OutOfQuota> {
        self.spend()?;
        let _ = self.seen.move_node(from, to);
        Ok(())
    }

    fn move_element(&mut self, element: Selector, to: Position) -> Result<(), OutOfQuota> {
        self.spend()?;
        let _ = self.seen.move_element(element, to);
        Ok(())
    }

    fn set_attribute(
        &mut self,
        element: Selector,
        name: &str,
        value: &str,
    ) -> Result<(), OutOfQuota> {
        self.spend()?;
        let _ = self.seen.set_attribute(element, name, value);
        Ok(())
    }

    fn remove_attribute(&mut self, element: Selector, name: &str) -> Result<(), OutOfQuota> {
        self.spend()?;
        let _ = self.seen.remove_attribute(element, name);
        Ok(())
    }

    fn set_value(&mut self, position: Position, text: &str) -> Result<(), OutOfQuota> {
        self.spend()?;
        let _ = self.seen.set_value(position, text);
        Ok(())
    }
}

#[test]
fn sink_failures_abort_without_rollback() {
    let mut before = parse_fragment("");
    let after = parse_fragment("<p>a</p><p>b</p>");
    let mut quota = Quota {
        left: 1,
        seen: Recorder::new(),
    };

    let err = diff(&mut before, &after, &mut quota).unwrap_err();
    assert!(matches!(err, DiffError::Sink(OutOfQuota)));

    // The first insert went through and stays applied.
    assert_eq!(quota.seen.operations.len(), 1);
    assert_eq!(before.to_markup(), "<p></p>");
}

#[test]
fn sink_failures_surface_as_the_sink_error() {
    let mut before = parse_fragment("<p class=\"x\">a</p>");
    let after = parse_fragment("<p class=\"y\">a</p>");
    let quota = Quota {
        left: 0,
        seen: Recorder::new(),
    };
    let err = diff(&mut before, &after, quota).unwrap_err();
    assert!(matches!(err, DiffError::Sink(OutOfQuota)));
    assert_eq!(before.to_markup(), "<p class=\"x\">a</p>");
}
