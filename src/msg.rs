use rmpv::Value;

/// Messages the reader thread hands to the dispatch loop.
#[derive(Debug)]
pub enum Msg {
    // -- From nvim
    Request {
        id: u32,
        method: String,
        params: Vec<Value>,
    },
    Notification {
        method: String,
        params: Vec<Value>,
    },

    // -- System
    Closed,
}
