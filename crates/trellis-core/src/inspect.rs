use std::fmt;

use crate::instance::Instance;
use crate::reconcile::Mounted;

/// What occupies one hook slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotInfo {
    State { type_name: &'static str },
    Effect { pending: bool, has_cleanup: bool },
    Memo { type_name: &'static str },
    Transition { pending: bool },
    Deferred { type_name: &'static str },
    Resource { type_name: &'static str, pending: bool },
    Vacant,
}

/// Point-in-time view of one mounted component instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceSnapshot {
    pub id: usize,
    pub component: &'static str,
    pub mounted: bool,
    pub render_count: u64,
    pub showing_fallback: bool,
    pub slots: Vec<SlotInfo>,
    pub children: Vec<InstanceSnapshot>,
    /// Instances a boundary keeps off-screen while its fallback shows.
    pub suspended: Vec<InstanceSnapshot>,
}

impl InstanceSnapshot {
    /// Depth-first search by component name.
    pub fn find(&self, component: &str) -> Option<&InstanceSnapshot> {
        if self.component == component {
            return Some(self);
        }
        self.children
            .iter()
            .chain(&self.suspended)
            .find_map(|child| child.find(component))
    }

    pub fn count(&self) -> usize {
        1 + self
            .children
            .iter()
            .chain(&self.suspended)
            .map(InstanceSnapshot::count)
            .sum::<usize>()
    }
}

impl fmt::Display for InstanceSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn write(snapshot: &InstanceSnapshot, depth: usize, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            writeln!(
                f,
                "{}{} #{} renders={} slots={}{}",
                "  ".repeat(depth),
                snapshot.component,
                snapshot.id,
                snapshot.render_count,
                snapshot.slots.len(),
                if snapshot.showing_fallback { " [fallback]" } else { "" }
            )?;
            for child in &snapshot.children {
                write(child, depth + 1, f)?;
            }
            if !snapshot.suspended.is_empty() {
                writeln!(f, "{}(suspended)", "  ".repeat(depth + 1))?;
                for child in &snapshot.suspended {
                    write(child, depth + 2, f)?;
                }
            }
            Ok(())
        }
        write(self, 0, f)
    }
}

/// Snapshots of the top-level instances under `mounted`.
pub(crate) fn collect(mounted: &Mounted, out: &mut Vec<InstanceSnapshot>) {
    match mounted {
        Mounted::Element { children, .. } => {
            for child in children {
                collect(child, out);
            }
        }
        Mounted::Text { .. } => {}
        Mounted::Component { instance } => out.push(snapshot(instance)),
    }
}

fn snapshot(instance: &Instance) -> InstanceSnapshot {
    let mut children = Vec::new();
    instance.with_rendered(|rendered| {
        if let Some(rendered) = rendered {
            collect(rendered, &mut children);
        }
    });
    let mut suspended = Vec::new();
    instance.with_parked(|parked| {
        if let Some(parked) = parked {
            collect(&parked.content, &mut suspended);
        }
    });
    InstanceSnapshot {
        id: instance.id(),
        component: instance.name(),
        mounted: instance.is_mounted(),
        render_count: instance.render_count(),
        showing_fallback: instance.is_showing_fallback(),
        slots: instance.slot_infos(),
        children,
        suspended,
    }
}
