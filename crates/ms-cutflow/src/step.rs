//! Step nodes: the per-channel mask-label lineage of one cutflow stage.

use std::collections::BTreeMap;

/// One node of the cutflow DAG.
///
/// A step node records, per channel, the ordered list of registry keys whose
/// conjunction selects "events surviving this step for this channel". Nodes
/// are immutable once created; a child's label list per channel is its
/// parent's list with exactly one label appended, so the list strictly grows
/// along any parent chain.
#[derive(Debug, Clone)]
pub struct StepNode {
    name: String,
    parent: Option<String>,
    depth: usize,
    mask_labels: BTreeMap<String, Vec<String>>,
}

impl StepNode {
    /// The root node: each channel's lineage starts with the channel's own
    /// defining mask key.
    pub fn root<'a>(name: &str, channels: impl IntoIterator<Item = &'a String>) -> Self {
        let mask_labels =
            channels.into_iter().map(|c| (c.clone(), vec![c.clone()])).collect();
        let node =
            Self { name: name.to_string(), parent: None, depth: 0, mask_labels };
        tracing::debug!("initialized step '{}' with mask labels {:?}", node.name, node.mask_labels);
        node
    }

    /// A child node appending one label per channel to the parent's lineage.
    ///
    /// `appended` must provide a label for every channel of the parent; the
    /// session validates this before construction.
    pub fn child(parent: &StepNode, name: &str, appended: &BTreeMap<String, String>) -> Self {
        let mut mask_labels = parent.mask_labels.clone();
        for (channel, labels) in mask_labels.iter_mut() {
            if let Some(label) = appended.get(channel) {
                labels.push(label.clone());
            }
        }
        let node = Self {
            name: name.to_string(),
            parent: Some(parent.name.clone()),
            depth: parent.depth + 1,
            mask_labels,
        };
        tracing::debug!("initialized step '{}' with mask labels {:?}", node.name, node.mask_labels);
        node
    }

    /// Step name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parent step name (`None` for the root).
    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// Chain length from the root (root = 0).
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Ordered mask keys for one channel.
    pub fn labels(&self, channel: &str) -> Option<&[String]> {
        self.mask_labels.get(channel).map(|v| v.as_slice())
    }

    /// All per-channel label chains.
    pub fn mask_labels(&self) -> &BTreeMap<String, Vec<String>> {
        &self.mask_labels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channels() -> Vec<String> {
        vec!["ee".to_string(), "mumu".to_string()]
    }

    #[test]
    fn root_lineage() {
        let root = StepNode::root("init", &channels());
        assert_eq!(root.depth(), 0);
        assert_eq!(root.parent(), None);
        assert_eq!(root.labels("ee").unwrap(), &["ee".to_string()]);
        assert_eq!(root.labels("mumu").unwrap(), &["mumu".to_string()]);
    }

    #[test]
    fn child_appends_exactly_one_label() {
        let root = StepNode::root("init", &channels());
        let shared: BTreeMap<String, String> = channels()
            .into_iter()
            .map(|c| (c, "cutA".to_string()))
            .collect();
        let child = StepNode::child(&root, "cutA", &shared);
        assert_eq!(child.depth(), 1);
        assert_eq!(child.parent(), Some("init"));
        for chan in ["ee", "mumu"] {
            let labels = child.labels(chan).unwrap();
            assert_eq!(labels.len(), 2);
            assert_eq!(&labels[..labels.len() - 1], root.labels(chan).unwrap());
        }
    }

    #[test]
    fn channel_wise_labels_differ_per_channel() {
        let root = StepNode::root("init", &channels());
        let appended = BTreeMap::from([
            ("ee".to_string(), "ee_trig".to_string()),
            ("mumu".to_string(), "mumu_trig".to_string()),
        ]);
        let child = StepNode::child(&root, "trig", &appended);
        assert_eq!(child.labels("ee").unwrap(), &["ee".to_string(), "ee_trig".to_string()]);
        assert_eq!(
            child.labels("mumu").unwrap(),
            &["mumu".to_string(), "mumu_trig".to_string()]
        );
    }
}
