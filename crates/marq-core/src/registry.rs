//! Named, priority-ordered collection shared by every pluggable stage.
//!
//! One ordering rule everywhere: highest priority first, ties in registration
//! order. Re-registering a name replaces its item and priority but keeps the
//! position it earned in the tie-breaking history.

use crate::error::RegistryError;

/// Gap used when a positional hint has no neighbour on one side.
const EDGE_GAP: f64 = 10.0;

/// Where to place a new registry entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Placement {
    /// Explicit numeric priority.
    Priority(f64),
    /// Immediately before the named entry in iteration order.
    Before(String),
    /// Immediately after the named entry in iteration order.
    After(String),
}

impl Placement {
    /// Place before `name`.
    #[must_use]
    pub fn before(name: impl Into<String>) -> Self {
        Self::Before(name.into())
    }

    /// Place after `name`.
    #[must_use]
    pub fn after(name: impl Into<String>) -> Self {
        Self::After(name.into())
    }
}

impl From<f64> for Placement {
    fn from(priority: f64) -> Self {
        Self::Priority(priority)
    }
}

/// Resolved position for a positional hint.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Slot {
    /// A priority of its own.
    Priority(f64),
    /// The anchor's priority, ordered among its ties by `sequence`.
    Tie { priority: f64, sequence: u64 },
}

#[derive(Debug)]
struct Entry<T> {
    name: String,
    item: T,
    priority: f64,
    sequence: u64,
}

/// Priority-ordered registry of named items.
///
/// # Example
///
/// ```
/// use marq_core::Registry;
///
/// let mut registry = Registry::new();
/// registry.register("low", 'l', 1.0).unwrap();
/// registry.register("high", 'h', 10.0).unwrap();
///
/// let order: Vec<_> = registry.names().collect();
/// assert_eq!(order, ["high", "low"]);
/// ```
#[derive(Debug)]
pub struct Registry<T> {
    entries: Vec<Entry<T>>,
    next_sequence: u64,
    unique_priorities: bool,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Registry<T> {
    /// Create an empty registry that allows priority ties.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_sequence: 0,
            unique_priorities: false,
        }
    }

    /// Create an empty registry that rejects priority ties.
    #[must_use]
    pub fn with_unique_priorities() -> Self {
        Self {
            unique_priorities: true,
            ..Self::new()
        }
    }

    /// Insert `item` under `name`, or replace the item and priority of an existing name.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicatePriority`] if this registry requires unique
    /// priorities and another entry already uses `priority`.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        item: T,
        priority: f64,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        if self.unique_priorities
            && let Some(existing) = self
                .entries
                .iter()
                .find(|e| e.name != name && e.priority.total_cmp(&priority).is_eq())
        {
            return Err(RegistryError::DuplicatePriority {
                name,
                priority,
                existing: existing.name.clone(),
            });
        }

        self.insert(name, item, priority);
        Ok(())
    }

    /// Insert or replace without the uniqueness check.
    pub(crate) fn insert(&mut self, name: impl Into<String>, item: T, priority: f64) {
        let name = name.into();
        if let Some(entry) = self.entries.iter_mut().find(|e| e.name == name) {
            entry.item = item;
            entry.priority = priority;
        } else {
            let sequence = self.next_sequence;
            self.next_sequence += 1;
            self.entries.push(Entry {
                name,
                item,
                priority,
                sequence,
            });
        }
        self.sort();
    }

    /// Register with a positional hint, returning the resolved priority.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownAnchor`] if the hint names an unregistered
    /// entry, or any error [`register`](Self::register) returns.
    pub fn register_at(
        &mut self,
        name: impl Into<String>,
        item: T,
        placement: impl Into<Placement>,
    ) -> Result<f64, RegistryError> {
        let name = name.into();
        match self.resolve(&name, &placement.into())? {
            Slot::Priority(priority) => {
                self.register(name, item, priority)?;
                Ok(priority)
            }
            Slot::Tie { priority, sequence } => {
                self.insert_at_sequence(name, item, priority, sequence);
                Ok(priority)
            }
        }
    }

    /// Insert `name` at `sequence` among entries sharing `priority`, shifting
    /// later sequences up by one. An existing entry with that name is moved.
    fn insert_at_sequence(&mut self, name: String, item: T, priority: f64, sequence: u64) {
        self.entries.retain(|e| e.name != name);
        for entry in &mut self.entries {
            if entry.sequence >= sequence {
                entry.sequence += 1;
            }
        }
        self.next_sequence += 1;
        self.entries.push(Entry {
            name,
            item,
            priority,
            sequence,
        });
        self.sort();
    }

    /// Remove the entry named `name` and return its item.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownName`] if nothing is registered under `name`.
    pub fn deregister(&mut self, name: &str) -> Result<T, RegistryError> {
        let index = self
            .index_of(name)
            .ok_or_else(|| RegistryError::UnknownName(name.to_owned()))?;
        Ok(self.entries.remove(index).item)
    }

    /// Item registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if nothing is registered under `name`.
    pub fn get(&self, name: &str) -> Result<&T, RegistryError> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| &e.item)
            .ok_or_else(|| RegistryError::NotFound(name.to_owned()))
    }

    /// Whether `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    /// Priority of the entry named `name`.
    #[must_use]
    pub fn priority(&self, name: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.priority)
    }

    /// Position of `name` in iteration order.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name == name)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries as `(name, item)`, highest priority first.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries.iter().map(|e| (e.name.as_str(), &e.item))
    }

    /// Items, highest priority first.
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|e| &e.item)
    }

    /// Names, highest priority first.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    /// Turn a placement into a slot for `name`.
    ///
    /// When the anchor shares its priority with a neighbour on the requested
    /// side, the entry takes the anchor's priority and is ordered against it by
    /// sequence. Otherwise `Before(x)` lands halfway between `x` and the next
    /// higher distinct priority, `After(x)` halfway between `x` and the next
    /// lower one. The entry being placed is ignored as a neighbour so it can be
    /// moved.
    fn resolve(&self, name: &str, placement: &Placement) -> Result<Slot, RegistryError> {
        let (anchor, before) = match placement {
            Placement::Priority(priority) => return Ok(Slot::Priority(*priority)),
            Placement::Before(anchor) => (anchor, true),
            Placement::After(anchor) => (anchor, false),
        };
        let anchor = self
            .entries
            .iter()
            .find(|e| e.name == *anchor)
            .ok_or_else(|| RegistryError::UnknownAnchor(anchor.clone()))?;
        let anchor_priority = anchor.priority;
        let others = move || {
            self.entries
                .iter()
                .filter(move |e| e.name != name && e.name != anchor.name)
        };

        let tied = others().any(|e| {
            e.priority.total_cmp(&anchor_priority).is_eq()
                && if before {
                    e.sequence < anchor.sequence
                } else {
                    e.sequence > anchor.sequence
                }
        });
        if tied {
            let sequence = if before {
                anchor.sequence
            } else {
                anchor.sequence + 1
            };
            return Ok(Slot::Tie {
                priority: anchor_priority,
                sequence,
            });
        }

        let priorities = others().map(|e| e.priority);
        let priority = if before {
            priorities
                .filter(|p| *p > anchor_priority)
                .min_by(f64::total_cmp)
                .map_or(anchor_priority + EDGE_GAP, |above| {
                    (anchor_priority + above) / 2.0
                })
        } else {
            priorities
                .filter(|p| *p < anchor_priority)
                .max_by(f64::total_cmp)
                .map_or(anchor_priority - EDGE_GAP, |below| {
                    (anchor_priority + below) / 2.0
                })
        };
        Ok(Slot::Priority(priority))
    }

    fn sort(&mut self) {
        self.entries.sort_by(|a, b| {
            b.priority
                .total_cmp(&a.priority)
                .then(a.sequence.cmp(&b.sequence))
        });
    }
}
