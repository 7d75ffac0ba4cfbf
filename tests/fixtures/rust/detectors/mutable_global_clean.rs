static LIMIT: u32 = 10;
