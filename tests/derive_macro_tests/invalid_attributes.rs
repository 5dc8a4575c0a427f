use cycle_rc::*;

#[derive(Trace)]
#[cycle_rc]
#[cycle_rc = ""]
struct MyStruct1 {}

#[derive(Trace)]
struct MyStruct2 {
    #[cycle_rc]
    #[cycle_rc = ""]
    a: (),
}

#[derive(Trace)]
#[cycle_rc]
#[cycle_rc = ""]
enum MyEnum1 {}

#[derive(Trace)]
enum MyEnum3 {
    #[cycle_rc]
    #[cycle_rc = ""]
    A(#[cycle_rc] #[cycle_rc = ""] i32),
    #[cycle_rc]
    #[cycle_rc = ""]
    B {
        #[cycle_rc]
        #[cycle_rc = ""]
        b: i32,
    },
}

fn main() {}
