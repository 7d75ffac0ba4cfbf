static mut COUNTER: u32 = 0;
