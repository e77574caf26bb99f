mod buffer;
mod candle;
mod event;
mod subscription;
mod tick;

pub use self::buffer::BarBuffer;
pub use self::candle::Candle;
pub use self::event::{ControlEvent, Event, MetaEvent};
pub use self::subscription::Subscription;
pub use self::tick::Tick;
