mod common;

use daftar_lib::accounts::get_accounts;
use daftar_lib::{apply_sms_balances, find_account_by_last4, parse_balances};

#[test]
fn documented_scenarios() {
    let masked = parse_balances("بانک ملی\nموجودی کارت ****1234: 2,500,000 ریال");
    assert_eq!(masked.into_iter().collect::<Vec<_>>(), vec![("1234".to_string(), 2_500_000)]);

    let persian = parse_balances("کارت ۵۶۷۸ موجودی: ۱۰۰۰۰۰");
    assert_eq!(persian.into_iter().collect::<Vec<_>>(), vec![("5678".to_string(), 100_000)]);
}

#[test]
fn pasted_inbox_updates_accounts() {
    let (mut conn, calendar, _dir) = common::setup_test_env();
    let clock = common::clock_at(&calendar, 1404, 7, 1);
    let inbox = "بانک ملت\n\
                 برداشت از کارت 6104-****-****-4321\n\
                 مبلغ: ۲۵۰٬۰۰۰\n\
                 6104-****-****-4321 مانده: ۱٬۲۵۰٬۰۰۰\n\
                 \n\
                 Bank Saderat\r\n\
                 Card ****8765 Balance: 9,800,000 IRR\r\n\
                 Card ****8765 Balance: 9,750,000 IRR";

    let applied = apply_sms_balances(&mut conn, inbox, &clock).expect("apply");
    assert_eq!(
        applied,
        vec![("4321".to_string(), 1_250_000), ("8765".to_string(), 9_750_000)]
    );

    let account = find_account_by_last4(&conn, "4321").expect("lookup").expect("account");
    assert_eq!(account.title, "کارت ****4321");
    assert_eq!(account.balance, 1_250_000.0);
    assert_eq!(get_accounts(&conn).expect("accounts").len(), 2);

    // a later SMS for a known card updates in place
    apply_sms_balances(&mut conn, "Card ****8765 available 10,000,000", &clock).expect("apply again");
    let accounts = get_accounts(&conn).expect("accounts");
    assert_eq!(accounts.len(), 2);
    let saderat = accounts.iter().find(|a| a.card_last4.as_deref() == Some("8765")).expect("card");
    assert_eq!(saderat.balance, 10_000_000.0);
}
