//! Per-batch cutflow session: owns the registry, the step DAG, and the
//! accumulated minitree.

use std::collections::BTreeMap;

use ms_columnar::{make_snapshot, EventBatch, Mask, Snapshot};
use ms_core::{Error, Result, TreeStructure};

use crate::cutflow::{CutflowRow, CutflowTable};
use crate::registry::SelectionRegistry;
use crate::step::StepNode;

/// Name of the root step created at session construction.
pub const INIT_STEP: &str = "init";

/// Accumulated snapshots: channel -> output tag -> snapshot.
pub type Minitree = BTreeMap<String, BTreeMap<String, Snapshot>>;

/// Mask argument for [`CutflowSession::add_step`].
#[derive(Debug)]
pub enum StepMask {
    /// One mask shared by every channel.
    Shared(Mask),
    /// One mask per channel; must cover every configured channel.
    PerChannel(BTreeMap<String, Mask>),
}

/// The selection bookkeeping for one event batch.
///
/// One session is constructed per input batch, driven by a selection
/// strategy, and consumed by the output stage. There is no cross-batch
/// state: dropping the session drops every mask and snapshot it owns.
///
/// Steps must be added in dependency order (parent before child); the
/// session rejects unknown parents rather than deferring resolution.
#[derive(Debug)]
pub struct CutflowSession {
    channels: Vec<String>,
    step_tag: String,
    registry: SelectionRegistry,
    steps: Vec<StepNode>,
    step_index: BTreeMap<String, usize>,
    minitree: Minitree,
}

impl CutflowSession {
    /// Initialize the selection: register each channel-defining mask under
    /// the channel's own name and create the root step [`INIT_STEP`].
    pub fn new(channels: &BTreeMap<String, Mask>, step_tag: impl Into<String>) -> Result<Self> {
        if channels.is_empty() {
            return Err(Error::EmptyChannels);
        }
        let mut registry = SelectionRegistry::new();
        for (name, mask) in channels {
            registry.add(name, mask.clone())?;
        }
        let names: Vec<String> = channels.keys().cloned().collect();
        let root = StepNode::root(INIT_STEP, &names);
        let mut step_index = BTreeMap::new();
        step_index.insert(INIT_STEP.to_string(), 0);
        Ok(Self {
            channels: names,
            step_tag: step_tag.into(),
            registry,
            steps: vec![root],
            step_index,
            minitree: Minitree::new(),
        })
    }

    /// Configured channel names.
    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    /// The underlying mask registry.
    pub fn registry(&self) -> &SelectionRegistry {
        &self.registry
    }

    /// A step node by label.
    pub fn step(&self, label: &str) -> Option<&StepNode> {
        self.step_index.get(label).map(|&idx| &self.steps[idx])
    }

    /// Steps in insertion order.
    pub fn steps(&self) -> impl Iterator<Item = &StepNode> {
        self.steps.iter()
    }

    /// Append one selection step parented to an existing step.
    ///
    /// A shared mask is registered once under `step_label`; a per-channel
    /// mask map is registered under `"{channel}_{step_label}"` per channel
    /// and must cover every configured channel. Re-using a step label is a
    /// logic error and surfaces as [`Error::DuplicateKey`] from the registry.
    pub fn add_step(&mut self, step_label: &str, mask: StepMask, parent: &str) -> Result<()> {
        let parent_idx = *self.step_index.get(parent).ok_or_else(|| Error::MissingParent {
            step: step_label.to_string(),
            parent: parent.to_string(),
        })?;

        let appended: BTreeMap<String, String> = match mask {
            StepMask::Shared(mask) => {
                self.registry.add(step_label, mask)?;
                self.channels.iter().map(|c| (c.clone(), step_label.to_string())).collect()
            }
            StepMask::PerChannel(masks) => {
                // Validate channel cover, key uniqueness, and mask lengths
                // before touching the registry, so a failed add leaves no
                // partial registration.
                for chan in &self.channels {
                    if !masks.contains_key(chan) {
                        return Err(Error::MissingChannelMask {
                            step: step_label.to_string(),
                            channel: chan.clone(),
                        });
                    }
                }
                let expected = self.registry.n_events();
                let mut appended = BTreeMap::new();
                for chan in &self.channels {
                    let key = format!("{chan}_{step_label}");
                    if self.registry.contains(&key) {
                        return Err(Error::DuplicateKey(key));
                    }
                    if let Some(n) = expected {
                        if masks[chan].len() != n {
                            return Err(Error::LengthMismatch {
                                name: key,
                                expected: n,
                                got: masks[chan].len(),
                            });
                        }
                    }
                    appended.insert(chan.clone(), key);
                }
                for chan in &self.channels {
                    let key = &appended[chan];
                    self.registry.add(key, masks[chan].clone())?;
                }
                appended
            }
        };

        let node = StepNode::child(&self.steps[parent_idx], step_label, &appended);
        self.step_index.insert(step_label.to_string(), self.steps.len());
        self.steps.push(node);
        Ok(())
    }

    /// Events surviving `step_label` for `channel`: the conjunction of the
    /// step's full label chain for that channel.
    pub fn survivors(&self, step_label: &str, channel: &str) -> Result<Mask> {
        let step = self
            .step(step_label)
            .ok_or_else(|| Error::Config(format!("unknown selection step '{step_label}'")))?;
        let labels = step
            .labels(channel)
            .ok_or_else(|| Error::UnknownChannel(channel.to_string()))?;
        self.registry.all(labels)
    }

    /// Materialize a snapshot of `events` at `step_label` for every channel,
    /// stored under `step_tag + step_name`.
    ///
    /// Snapshotting reads but never mutates selection state, so the same
    /// step may be snapshotted under several output names.
    pub fn snapshot(
        &mut self,
        events: &EventBatch,
        step_label: &str,
        step_name: &str,
        structure: &TreeStructure,
    ) -> Result<()> {
        for chan in self.channels.clone() {
            let mask = self.survivors(step_label, &chan)?;
            tracing::debug!(
                "snapshot '{step_name}' channel '{chan}': {} / {} events",
                mask.count(),
                mask.len()
            );
            let selected = events.filter(&mask)?;
            let snap = make_snapshot(&selected, structure, false);
            self.minitree
                .entry(chan)
                .or_default()
                .insert(format!("{}{step_name}", self.step_tag), snap);
        }
        Ok(())
    }

    /// Signal-only generator-level snapshot before any reconstruction cut.
    ///
    /// Reconstruction outputs are padded with the sentinel; generator fields
    /// are kept. An empty `gen_channels` map falls back to the reco channel
    /// masks with a warning; a key mismatch is a configuration error.
    pub fn snapshot_step0(
        &mut self,
        events: &EventBatch,
        gen_channels: &BTreeMap<String, Mask>,
        structure: &TreeStructure,
    ) -> Result<()> {
        let fallback: BTreeMap<String, Mask>;
        let gen_channels = if gen_channels.is_empty() {
            tracing::warn!("generator channels empty, falling back to reco channels");
            fallback = self
                .channels
                .iter()
                .map(|c| Ok((c.clone(), self.registry.get(c)?.clone())))
                .collect::<Result<_>>()?;
            &fallback
        } else {
            let gen_keys: Vec<&String> = gen_channels.keys().collect();
            let reco_keys: Vec<&String> = self.channels.iter().collect();
            if gen_keys != reco_keys {
                return Err(Error::Config(
                    "generator and reco channel keys do not match".into(),
                ));
            }
            gen_channels
        };

        for (chan, mask) in gen_channels {
            let selected = events.filter(mask)?;
            let snap = make_snapshot(&selected, structure, true);
            self.minitree
                .entry(chan.clone())
                .or_default()
                .insert(format!("{}step0", self.step_tag), snap);
        }
        Ok(())
    }

    /// Per-channel cutflow rows for the chain ending at `last_step`: an
    /// "Initial" row (all events) followed by the cumulative survivor sums
    /// after each label of the chain.
    pub fn cutflow(
        &self,
        events: &EventBatch,
        last_step: &str,
        weight_field: &str,
    ) -> Result<CutflowTable> {
        let step = self
            .step(last_step)
            .ok_or_else(|| Error::Config(format!("unknown selection step '{last_step}'")))?;
        let weights = events.f64s(weight_field)?;
        let total: f64 = weights.iter().sum();
        let total_sq: f64 = weights.iter().map(|w| w * w).sum();

        let mut table = CutflowTable::default();
        for chan in &self.channels {
            let labels = step
                .labels(chan)
                .ok_or_else(|| Error::UnknownChannel(chan.clone()))?;
            let mut rows = vec![CutflowRow {
                label: "Initial".to_string(),
                sum_weights: total,
                sum_weights_sq: total_sq,
            }];
            for i in 1..=labels.len() {
                let mask = self.registry.all(&labels[..i])?;
                let mut sumw = 0.0;
                let mut sumw2 = 0.0;
                for (w, keep) in weights.iter().zip(mask.iter()) {
                    if keep {
                        sumw += w;
                        sumw2 += w * w;
                    }
                }
                rows.push(CutflowRow {
                    label: labels[i - 1].clone(),
                    sum_weights: sumw,
                    sum_weights_sq: sumw2,
                });
            }
            table.channels.insert(chan.clone(), rows);
        }
        Ok(table)
    }

    /// Read access to the accumulated minitree.
    pub fn minitree(&self) -> &Minitree {
        &self.minitree
    }

    /// Hand the accumulated minitree to the output stage, consuming the
    /// session.
    pub fn into_minitree(self) -> Minitree {
        self.minitree
    }
}
