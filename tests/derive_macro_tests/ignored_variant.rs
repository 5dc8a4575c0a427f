use std::cell::{Cell, RefCell};
use cycle_rc::*;

struct ToTrace {
    has_been_traced: Cell<bool>,
}

unsafe impl Trace for ToTrace {
    fn trace(&self, _: &mut Context<'_>) {
        self.has_been_traced.set(true);
    }
}

impl ToTrace {
    fn new() -> Gc<ToTrace> {
        Gc::new(ToTrace { has_been_traced: Cell::new(false) })
    }
}

#[derive(Trace)]
enum MyEnum {
    #[cycle_rc(ignore)]
    A {
        cyclic: RefCell<Option<Gc<MyEnum>>>,
        ignored: Gc<ToTrace>,
    },
}

fn main() {
    let my_struct = Gc::new(MyEnum::A {
        cyclic: RefCell::new(None),
        ignored: ToTrace::new(),
    });

    let MyEnum::A { cyclic, ignored } = &*my_struct;

    *cyclic.borrow_mut() = Some(my_struct.clone());

    let _ = my_struct.clone();
    cycle_rc::collect();

    assert!(!ignored.has_been_traced.get());
}
