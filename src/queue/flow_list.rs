//! 流链表
//!
//! new/old/empty 链表都是侵入式双向链表：前后链接保存在流队列自身
//! （`FlowQueue::links`），链表只记录头、尾和长度。插入、摘除任意节点
//! 都是 O(1)，不随链表长度增长。

use super::flow_queue::FlowQueue;
use crate::net::FlowId;

/// 流队列里的链表节点
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Links {
    pub(crate) prev: Option<FlowId>,
    pub(crate) next: Option<FlowId>,
}

/// 流队列 arena：槽位为 `None` 表示已销毁
pub(crate) type Arena<P> = Vec<Option<Box<FlowQueue<P>>>>;

fn links_mut<P>(arena: &mut Arena<P>, id: FlowId) -> &mut Links {
    match arena.get_mut(id.0).and_then(|f| f.as_deref_mut()) {
        Some(fq) => &mut fq.links,
        None => panic!("stale flow id {:?} in flow list", id),
    }
}

#[derive(Debug, Default)]
pub(crate) struct FlowList {
    head: Option<FlowId>,
    tail: Option<FlowId>,
    len: usize,
}

impl FlowList {
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn front(&self) -> Option<FlowId> {
        self.head
    }

    pub(crate) fn push_back<P>(&mut self, arena: &mut Arena<P>, id: FlowId) {
        let tail = self.tail;
        let links = links_mut(arena, id);
        assert!(
            links.prev.is_none() && links.next.is_none() && self.head != Some(id),
            "flow {:?} is already linked",
            id
        );
        links.prev = tail;
        match tail {
            Some(t) => links_mut(arena, t).next = Some(id),
            None => self.head = Some(id),
        }
        self.tail = Some(id);
        self.len += 1;
    }

    /// 摘除任意位置的节点
    pub(crate) fn unlink<P>(&mut self, arena: &mut Arena<P>, id: FlowId) {
        let Links { prev, next } = std::mem::take(links_mut(arena, id));
        match prev {
            Some(p) => links_mut(arena, p).next = next,
            None => {
                assert_eq!(self.head, Some(id), "flow {:?} missing from its list", id);
                self.head = next;
            }
        }
        match next {
            Some(n) => links_mut(arena, n).prev = prev,
            None => self.tail = prev,
        }
        self.len -= 1;
    }

    pub(crate) fn iter<'a, P>(&self, arena: &'a Arena<P>) -> impl Iterator<Item = FlowId> + use<'a, P> {
        let mut cur = self.head;
        std::iter::from_fn(move || {
            let id = cur?;
            cur = arena
                .get(id.0)
                .and_then(|f| f.as_deref())
                .and_then(|fq| fq.links.next);
            Some(id)
        })
    }
}
