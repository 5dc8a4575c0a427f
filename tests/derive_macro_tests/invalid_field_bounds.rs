use cycle_rc::*;

struct DoesNotImplementTrace;

#[derive(Trace)]
struct MyStruct1 {
    field: DoesNotImplementTrace,
}

#[derive(Trace)]
enum MyEnum3 {
    A(DoesNotImplementTrace),
}

fn main() {}
