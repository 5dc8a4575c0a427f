use cycle_rc::*;

#[derive(Trace)]
#[cycle_rc()]
struct MyStruct {
    #[cycle_rc()]
    a: (),
}

#[derive(Trace)]
#[cycle_rc()]
enum MyEnum {
    #[cycle_rc()]
    A(#[cycle_rc()] i32),
    #[cycle_rc()]
    B {
        #[cycle_rc()]
        b: i32,
    },
}

fn main() {}
