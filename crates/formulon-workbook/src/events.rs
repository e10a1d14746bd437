//! Synchronous observation via `on(event, listener)`. Listeners are invoked
//! only after the engine has restored its own invariants (cache
//! cleared/invalidated, workbook structure updated) so a listener never
//! observes a torn state.

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    CellChanged,
    SheetAdded,
    SheetRemoved,
    TablesUpdated,
    GlobalNamedExpressionsUpdated,
}

#[derive(Clone, Debug)]
pub enum Event {
    CellChanged { workbook: String, sheet: String, row: u32, col: u32 },
    SheetAdded { workbook: String, sheet: String },
    SheetRemoved { workbook: String, sheet: String },
    TablesUpdated,
    GlobalNamedExpressionsUpdated,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::CellChanged { .. } => EventKind::CellChanged,
            Event::SheetAdded { .. } => EventKind::SheetAdded,
            Event::SheetRemoved { .. } => EventKind::SheetRemoved,
            Event::TablesUpdated => EventKind::TablesUpdated,
            Event::GlobalNamedExpressionsUpdated => EventKind::GlobalNamedExpressionsUpdated,
        }
    }
}

pub(crate) type Listener = Box<dyn FnMut(&Event)>;

#[derive(Default)]
pub(crate) struct Listeners {
    by_kind: Vec<(EventKind, Listener)>,
}

impl Listeners {
    pub(crate) fn add(&mut self, kind: EventKind, listener: Listener) {
        self.by_kind.push((kind, listener));
    }

    pub(crate) fn emit(&mut self, event: Event) {
        let kind = event.kind();
        for (registered_kind, listener) in self.by_kind.iter_mut() {
            if *registered_kind == kind {
                listener(&event);
            }
        }
    }
}
