//! 观察者注册

use crate::ServiceEvent;

/// 服务事件观察者
pub trait ServiceObserver {
    fn on_event(&mut self, event: &ServiceEvent);
}

impl<F> ServiceObserver for F
where
    F: FnMut(&ServiceEvent),
{
    fn on_event(&mut self, event: &ServiceEvent) {
        self(event)
    }
}

pub type BoxedObserver = Box<dyn ServiceObserver + Send>;

/// 注册句柄，用于注销
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

#[derive(Default)]
pub struct Observers {
    entries: Vec<(ObserverId, BoxedObserver)>,
    next_id: u64,
}

impl Observers {
    pub fn register(&mut self, observer: BoxedObserver) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, observer));
        id
    }

    /// 返回是否找到并移除
    pub fn unregister(&mut self, id: ObserverId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        self.entries.len() != before
    }

    pub fn notify(&mut self, event: &ServiceEvent) {
        for (_, observer) in &mut self.entries {
            observer.on_event(event);
        }
    }
}
