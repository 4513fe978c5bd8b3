//! The symbolic evaluation stack used during bytecode translation and trace
//! recording.
//!
//! A [State] models the JVM's operand stack and local variables as one flat
//! slot array plus a stack of [Frame]s, one per logical call. Category-2
//! (64-bit) values occupy two consecutive slots, the second holding a
//! distinguished filler element; all slot walking here skips fillers.
//!
//! A [State] belongs to a single translation or recording session and must
//! not be shared between threads; fork a speculative copy with
//! [State::clone] or [State::slice] instead.

use crate::{bytecode::Opcode, kind::Kind, method::MethodActor};
use smallvec::SmallVec;
use std::{fmt, sync::Arc};

/// The capabilities a slot element must provide: the two sentinel values and
/// kind classification. These used to be factory methods on the container;
/// they are a property of the element type, so they live on it.
pub trait SlotElement: Clone + PartialEq + fmt::Debug {
    /// The sentinel filling local slots that have no defined value yet.
    fn undefined() -> Self;
    /// The sentinel occupying the second slot of a category-2 value.
    fn filler() -> Self;
    fn kind(&self) -> Kind;
    /// Reclassify the element, e.g. when a store narrows an int to a
    /// sub-int local.
    fn set_kind(&mut self, kind: Kind);

    fn is_filler(&self) -> bool {
        *self == Self::filler()
    }

    fn is_undefined(&self) -> bool {
        *self == Self::undefined()
    }
}

/// One logical call's region within a [State]'s slot array: `lp` indexes the
/// frame's first local slot, `sp` one past its last occupied slot, and `pc`
/// the bytecode position (the resumption point, once a callee is entered).
#[derive(Clone, Debug)]
pub struct Frame {
    method: Arc<MethodActor>,
    lp: usize,
    sp: usize,
    pc: usize,
}

impl Frame {
    pub fn method(&self) -> &Arc<MethodActor> {
        &self.method
    }

    pub fn lp(&self) -> usize {
        self.lp
    }

    pub fn sp(&self) -> usize {
        self.sp
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    /// Slots between the local base and the stack pointer.
    pub fn height(&self) -> usize {
        self.sp - self.lp
    }

    /// Operand-stack height, excluding the local-variable area.
    pub fn stack_height(&self) -> usize {
        self.height() - self.method.max_locals()
    }

    /// The trace-matching predicate: same method identity and the same
    /// shape. Slot values are deliberately not compared.
    pub fn matches(&self, other: &Frame) -> bool {
        Arc::ptr_eq(&self.method, &other.method) && self.height() == other.height()
    }
}

/// A symbolic evaluation stack over elements of type `T`.
#[derive(Clone)]
pub struct State<T: SlotElement> {
    slots: Vec<T>,
    frames: SmallVec<[Frame; 4]>,
}

impl<T: SlotElement> State<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            frames: SmallVec::new(),
        }
    }

    pub fn has_frames(&self) -> bool {
        !self.frames.is_empty()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// The innermost frame. Calling this on an empty state is a bug in the
    /// translator driving us.
    pub fn active_frame(&self) -> &Frame {
        self.frames.last().unwrap()
    }

    /// Total slots in use, across all frames.
    pub fn total_slots(&self) -> usize {
        self.slots.len()
    }

    /// Enter `method`: its parameters are consumed from the caller's operand
    /// stack and become the callee's first locals, in place; remaining
    /// locals start undefined. The caller's `pc` is parked at `return_pc`,
    /// the point it resumes at when the callee leaves. Entering on an empty
    /// state creates the outermost frame with every local undefined.
    pub fn enter(&mut self, method: Arc<MethodActor>, return_pc: usize) {
        let nparams = method.parameter_slots();
        let lp = match self.frames.last_mut() {
            Some(caller) => {
                debug_assert!(
                    caller.stack_height() >= nparams,
                    "too few operands for the {} parameter slots of {}",
                    nparams,
                    method.name()
                );
                caller.sp -= nparams;
                caller.pc = return_pc;
                caller.sp
            }
            None => {
                debug_assert!(self.slots.is_empty());
                for _ in 0..nparams {
                    self.slots.push(T::undefined());
                }
                0
            }
        };
        let sp = lp + method.max_locals();
        while self.slots.len() < sp {
            self.slots.push(T::undefined());
        }
        self.frames.push(Frame {
            method,
            lp,
            sp,
            pc: 0,
        });
    }

    /// Discard the active frame, transferring the return value (if the
    /// method declares one) onto the caller's operand stack, exactly as if
    /// the call had been inlined.
    pub fn leave(&mut self) {
        let result_kind = self.active_frame().method.result_kind();
        let result = if result_kind != Kind::Void {
            Some(self.pop(result_kind))
        } else {
            None
        };
        let frame = self.frames.pop().unwrap();
        self.slots.truncate(frame.lp);
        if let Some(value) = result {
            debug_assert!(self.has_frames(), "return value with no caller frame");
            self.push(value);
        }
    }

    /// Discard the active frame without touching a return value.
    pub fn leave_without_return(&mut self) {
        let frame = self.frames.pop().unwrap();
        self.slots.truncate(frame.lp);
    }

    /// Push a single slot, ignoring the element's category.
    pub fn push_one(&mut self, value: T) {
        let frame = self.frames.last_mut().unwrap();
        debug_assert_eq!(frame.sp, self.slots.len());
        self.slots.push(value);
        frame.sp += 1;
    }

    /// Pop a single slot, ignoring categories.
    pub fn pop_one(&mut self) -> T {
        let frame = self.frames.last_mut().unwrap();
        debug_assert_eq!(frame.sp, self.slots.len());
        debug_assert!(
            frame.stack_height() > 0,
            "operand stack underflow in {}",
            frame.method.name()
        );
        frame.sp -= 1;
        self.slots.pop().unwrap()
    }

    /// Push a value; a category-2 element is followed by a filler slot.
    pub fn push(&mut self, value: T) {
        let category2 = value.kind().is_category2();
        self.push_one(value);
        if category2 {
            self.push_one(T::filler());
        }
    }

    /// Pop a value of `kind`, consuming the trailing filler slot for
    /// category-2 kinds. In debug builds the popped element's stack kind
    /// must agree with the expected kind.
    pub fn pop(&mut self, kind: Kind) -> T {
        if kind.is_category2() {
            let filler = self.pop_one();
            debug_assert!(
                filler.is_filler(),
                "category-2 value not followed by a filler slot"
            );
        }
        let value = self.pop_one();
        debug_assert_eq!(
            value.kind().stack_kind(),
            kind.stack_kind(),
            "popped a {:?} where a {:?} was expected",
            value.kind(),
            kind
        );
        value
    }

    /// The topmost value of `kind`, left in place.
    pub fn peek(&self, kind: Kind) -> &T {
        let frame = self.active_frame();
        debug_assert!(frame.stack_height() >= kind.slot_count());
        &self.slots[frame.sp - kind.slot_count()]
    }

    /// Push a copy of local `index` of the active frame.
    pub fn load_local(&mut self, kind: Kind, index: usize) {
        let frame = self.active_frame();
        debug_assert!(index + kind.slot_count() <= frame.method.max_locals());
        let value = self.slots[frame.lp + index].clone();
        self.push(value);
    }

    /// Pop a value of `kind` into local `index` of the active frame,
    /// normalizing the element's kind to the declared one.
    pub fn store_local(&mut self, kind: Kind, index: usize) {
        let mut value = self.pop(kind);
        value.set_kind(kind);
        let frame = self.active_frame();
        debug_assert!(index + kind.slot_count() <= frame.method.max_locals());
        let slot = frame.lp + index;
        self.slots[slot] = value;
        if kind.is_category2() {
            self.slots[slot + 1] = T::filler();
        }
    }

    /// Interpret one of the operand-stack shuffle bytecodes (JVMS §6.5)
    /// purely in terms of single-slot pushes and pops. Any other opcode
    /// reaching this dispatcher is a bug in the translator.
    pub fn execute(&mut self, opcode: Opcode) {
        match opcode {
            Opcode::Pop => {
                self.pop_one();
            }
            Opcode::Pop2 => {
                self.pop_one();
                self.pop_one();
            }
            Opcode::Swap => {
                let v1 = self.pop_one();
                let v2 = self.pop_one();
                self.push_one(v1);
                self.push_one(v2);
            }
            Opcode::Dup => {
                let v1 = self.pop_one();
                self.push_one(v1.clone());
                self.push_one(v1);
            }
            Opcode::DupX1 => {
                let v1 = self.pop_one();
                let v2 = self.pop_one();
                self.push_one(v1.clone());
                self.push_one(v2);
                self.push_one(v1);
            }
            Opcode::DupX2 => {
                let v1 = self.pop_one();
                let v2 = self.pop_one();
                let v3 = self.pop_one();
                self.push_one(v1.clone());
                self.push_one(v3);
                self.push_one(v2);
                self.push_one(v1);
            }
            Opcode::Dup2 => {
                let v1 = self.pop_one();
                let v2 = self.pop_one();
                self.push_one(v2.clone());
                self.push_one(v1.clone());
                self.push_one(v2);
                self.push_one(v1);
            }
            Opcode::Dup2X1 => {
                let v1 = self.pop_one();
                let v2 = self.pop_one();
                let v3 = self.pop_one();
                self.push_one(v2.clone());
                self.push_one(v1.clone());
                self.push_one(v3);
                self.push_one(v2);
                self.push_one(v1);
            }
            Opcode::Dup2X2 => {
                let v1 = self.pop_one();
                let v2 = self.pop_one();
                let v3 = self.pop_one();
                let v4 = self.pop_one();
                self.push_one(v2.clone());
                self.push_one(v1.clone());
                self.push_one(v4);
                self.push_one(v3);
                self.push_one(v2);
                self.push_one(v1);
            }
            op => panic!("bytecode {op} is not an operand-stack shuffle"),
        }
    }

    /// Structural equality over whole frame stacks, used to decide whether a
    /// previously recorded trace applies at a re-entry point. The element
    /// types of the two states may differ; values are never compared.
    pub fn matches<U: SlotElement>(&self, other: &State<U>) -> bool {
        self.frames.len() == other.frames.len() && self.matches_slice_of(other)
    }

    /// As [State::matches], but `self`'s frames only need to match the
    /// innermost frames of `other`.
    pub fn matches_slice_of<U: SlotElement>(&self, other: &State<U>) -> bool {
        if self.frames.len() > other.frames.len() {
            return false;
        }
        self.frames
            .iter()
            .rev()
            .zip(other.frames.iter().rev())
            .all(|(a, b)| a.matches(b))
    }

    /// Visit every logical slot (the second slot of a category-2 value is
    /// skipped), optionally restricted to slots `filter` accepts.
    pub fn visit<F>(&self, filter: Option<&dyn Fn(&T) -> bool>, mut f: F)
    where
        F: FnMut(usize, &T),
    {
        for (i, slot) in self.slots.iter().enumerate() {
            if slot.is_filler() {
                continue;
            }
            if let Some(accepts) = filter {
                if !accepts(slot) {
                    continue;
                }
            }
            f(i, slot);
        }
    }

    /// Visit `self`'s logical slots pairwise with `other`'s; where `other`
    /// is shorter, the missing slots are presented as undefined.
    pub fn compare<U: SlotElement, F>(&self, other: &State<U>, mut f: F)
    where
        F: FnMut(usize, &T, &U),
    {
        let missing = U::undefined();
        for (i, slot) in self.slots.iter().enumerate() {
            if slot.is_filler() {
                continue;
            }
            f(i, slot, other.slots.get(i).unwrap_or(&missing));
        }
    }

    /// A copy of the innermost `n` frames and their slots, rebased so the
    /// outermost sliced frame's locals start at slot zero. Used to fork a
    /// state for nested or speculative recording.
    pub fn slice(&self, n: usize) -> State<T> {
        debug_assert!(n >= 1 && n <= self.frames.len());
        let first = self.frames.len() - n;
        let base = self.frames[first].lp;
        let frames = self.frames[first..]
            .iter()
            .map(|f| Frame {
                method: Arc::clone(&f.method),
                lp: f.lp - base,
                sp: f.sp - base,
                pc: f.pc,
            })
            .collect();
        State {
            slots: self.slots[base..].to_vec(),
            frames,
        }
    }
}

impl<T: SlotElement> Default for State<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: SlotElement> fmt::Debug for State<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("slots", &self.slots)
            .field("frames", &self.frames)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{SlotElement, State};
    use crate::{bytecode::Opcode, kind::Kind, method::MethodActor};
    use std::sync::Arc;

    /// A concrete symbolic element: a kind plus an identifying payload.
    #[derive(Clone, Debug, PartialEq)]
    enum Slot {
        Undefined,
        Filler,
        Value(Kind, i64),
    }

    impl SlotElement for Slot {
        fn undefined() -> Self {
            Slot::Undefined
        }

        fn filler() -> Self {
            Slot::Filler
        }

        fn kind(&self) -> Kind {
            match self {
                Slot::Value(kind, _) => *kind,
                Slot::Undefined | Slot::Filler => Kind::Void,
            }
        }

        fn set_kind(&mut self, kind: Kind) {
            if let Slot::Value(k, _) = self {
                *k = kind;
            }
        }
    }

    fn int(v: i64) -> Slot {
        Slot::Value(Kind::Int, v)
    }

    fn long(v: i64) -> Slot {
        Slot::Value(Kind::Long, v)
    }

    fn method(params: Vec<Kind>, max_locals: usize, result: Kind) -> Arc<MethodActor> {
        MethodActor::new("m", params, max_locals, result)
    }

    /// A state with one entered frame of `max_locals` locals, all undefined.
    fn outer(max_locals: usize) -> State<Slot> {
        let mut state = State::new();
        state.enter(method(vec![], max_locals, Kind::Void), 0);
        state
    }

    #[test]
    fn push_pop_round_trip() {
        let mut state = outer(0);
        state.push(int(7));
        assert_eq!(state.active_frame().stack_height(), 1);
        assert_eq!(state.pop(Kind::Int), int(7));
        assert_eq!(state.active_frame().stack_height(), 0);
    }

    #[test]
    fn category2_occupies_two_slots() {
        let mut state = outer(0);
        let before = state.total_slots();
        state.push(long(9));
        assert_eq!(state.total_slots(), before + 2);
        assert_eq!(state.pop(Kind::Long), long(9));
        assert_eq!(state.total_slots(), before);
    }

    #[test]
    fn enter_makes_parameters_the_callee_locals() {
        let mut state = outer(0);
        state.push(int(1));
        state.push(long(2));
        let callee = method(vec![Kind::Int, Kind::Long], 5, Kind::Void);
        state.enter(Arc::clone(&callee), 17);
        let frame = state.active_frame();
        assert!(Arc::ptr_eq(frame.method(), &callee));
        assert_eq!(frame.stack_height(), 0);
        // The parameters became locals 0..3 in place; the remaining two
        // locals are undefined.
        state.load_local(Kind::Int, 0);
        assert_eq!(state.pop(Kind::Int), int(1));
        state.load_local(Kind::Long, 1);
        assert_eq!(state.pop(Kind::Long), long(2));
        assert!(state.frames()[0].pc() == 17);
    }

    #[test]
    fn leave_transfers_the_result() {
        let mut state = outer(0);
        state.push(int(5));
        let pre_call_sp = state.active_frame().sp();
        let callee = method(vec![Kind::Int], 1, Kind::Long);
        state.enter(callee, 3);
        state.push(long(11));
        state.leave();
        // One parameter slot consumed, one category-2 result produced.
        assert_eq!(state.active_frame().sp(), pre_call_sp - 1 + 2);
        assert_eq!(state.pop(Kind::Long), long(11));
    }

    #[test]
    fn leave_without_return_discards_the_frame() {
        let mut state = outer(0);
        state.push(int(5));
        let callee = method(vec![Kind::Int], 2, Kind::Int);
        state.enter(callee, 0);
        state.push(int(8));
        state.leave_without_return();
        assert_eq!(state.frames().len(), 1);
        assert_eq!(state.active_frame().stack_height(), 0);
    }

    #[test]
    fn enter_on_an_empty_state_leaves_locals_undefined() {
        let mut state: State<Slot> = State::new();
        state.enter(method(vec![Kind::Int], 3, Kind::Void), 0);
        assert_eq!(state.total_slots(), 3);
        state.load_local(Kind::Int, 1);
        assert!(state.pop_one().is_undefined());
    }

    #[test]
    fn store_local_normalizes_the_kind() {
        let mut state = outer(2);
        state.push(int(42));
        state.store_local(Kind::Short, 0);
        state.load_local(Kind::Short, 0);
        assert_eq!(state.pop_one(), Slot::Value(Kind::Short, 42));
    }

    #[test]
    fn dup_duplicates_the_top_slot() {
        let mut state = outer(0);
        state.push(int(3));
        state.execute(Opcode::Dup);
        assert_eq!(state.pop(Kind::Int), int(3));
        assert_eq!(state.pop(Kind::Int), int(3));
        assert_eq!(state.active_frame().stack_height(), 0);
    }

    #[test]
    fn swap_exchanges_the_two_top_slots() {
        let mut state = outer(0);
        state.push(int(1));
        state.push(int(2));
        state.execute(Opcode::Swap);
        assert_eq!(state.pop(Kind::Int), int(1));
        assert_eq!(state.pop(Kind::Int), int(2));
    }

    #[test]
    fn dup_x1_inserts_below_the_second_slot() {
        let mut state = outer(0);
        state.push(int(1));
        state.push(int(2));
        state.execute(Opcode::DupX1);
        assert_eq!(state.pop(Kind::Int), int(2));
        assert_eq!(state.pop(Kind::Int), int(1));
        assert_eq!(state.pop(Kind::Int), int(2));
    }

    #[test]
    fn dup2_duplicates_a_category2_value() {
        let mut state = outer(0);
        state.push(long(6));
        state.execute(Opcode::Dup2);
        assert_eq!(state.pop(Kind::Long), long(6));
        assert_eq!(state.pop(Kind::Long), long(6));
        assert_eq!(state.active_frame().stack_height(), 0);
    }

    #[test]
    fn dup2_x2_shuffles_four_slots() {
        let mut state = outer(0);
        for v in 1..=4 {
            state.push(int(v));
        }
        state.execute(Opcode::Dup2X2);
        let drained: Vec<_> = (0..6).map(|_| state.pop(Kind::Int)).collect();
        assert_eq!(
            drained,
            vec![int(4), int(3), int(2), int(1), int(4), int(3)]
        );
    }

    #[test]
    #[should_panic]
    fn non_shuffle_bytecode_is_fatal() {
        let mut state = outer(0);
        state.push(int(1));
        state.push(int(2));
        state.execute(Opcode::Iadd);
    }

    #[test]
    fn matches_compares_shape_not_values() {
        let m = method(vec![], 1, Kind::Void);
        let mut a: State<Slot> = State::new();
        let mut b: State<Slot> = State::new();
        a.enter(Arc::clone(&m), 0);
        b.enter(Arc::clone(&m), 0);
        a.push(int(1));
        b.push(int(999));
        assert!(a.matches(&b));
        b.push(int(0));
        assert!(!a.matches(&b));
        // A different method identity with the same shape does not match.
        let mut c: State<Slot> = State::new();
        c.enter(method(vec![], 1, Kind::Void), 0);
        c.push(int(1));
        assert!(!a.matches(&c));
    }

    #[test]
    fn matches_slice_of_ignores_outer_frames() {
        let m = method(vec![], 0, Kind::Void);
        let inner = method(vec![], 2, Kind::Void);
        let mut nested: State<Slot> = State::new();
        nested.enter(m, 0);
        nested.enter(Arc::clone(&inner), 5);
        nested.push(int(1));
        let mut flat: State<Slot> = State::new();
        flat.enter(inner, 0);
        flat.push(int(2));
        assert!(flat.matches_slice_of(&nested));
        assert!(!flat.matches(&nested));
        assert!(!nested.matches_slice_of(&flat));
    }

    #[test]
    fn slice_rebases_the_innermost_frames() {
        let outer_m = method(vec![], 3, Kind::Void);
        let inner_m = method(vec![], 1, Kind::Void);
        let mut state: State<Slot> = State::new();
        state.enter(outer_m, 0);
        state.push(int(1));
        state.enter(Arc::clone(&inner_m), 9);
        state.push(long(2));
        let sliced = state.slice(1);
        assert_eq!(sliced.frames().len(), 1);
        assert_eq!(sliced.frames()[0].lp(), 0);
        let mut flat: State<Slot> = State::new();
        flat.enter(inner_m, 0);
        flat.push(long(3));
        assert!(sliced.matches(&flat));
    }

    #[test]
    fn visit_skips_fillers() {
        let mut state = outer(0);
        state.push(int(1));
        state.push(long(2));
        state.push(int(3));
        let mut seen = Vec::new();
        state.visit(None, |_, slot| seen.push(slot.clone()));
        assert_eq!(seen, vec![int(1), long(2), int(3)]);
        let only_longs = |s: &Slot| s.kind() == Kind::Long;
        let mut longs = Vec::new();
        state.visit(Some(&only_longs), |_, slot| longs.push(slot.clone()));
        assert_eq!(longs, vec![long(2)]);
    }

    #[test]
    fn compare_pads_the_shorter_state_with_undefined() {
        let mut a = outer(0);
        a.push(int(1));
        a.push(int(2));
        let mut b = outer(0);
        b.push(int(1));
        let mut pairs = Vec::new();
        a.compare(&b, |_, x, y: &Slot| pairs.push((x.clone(), y.clone())));
        assert_eq!(
            pairs,
            vec![(int(1), int(1)), (int(2), Slot::Undefined)]
        );
    }
}
