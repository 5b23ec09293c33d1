use crate::models::{Booking, BookingRequest, Business, OtpPurpose, User};
use crate::services::email::Email;

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="UTF-8"><title>{title}</title></head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
  <div style="max-width: 600px; margin: 0 auto; padding: 20px;">
    <h2 style="color: #db2777;">{title}</h2>
    {body}
  </div>
</body>
</html>"#
    )
}

fn when(booking: &Booking) -> String {
    booking.date_time.format("%A, %B %-d at %-I:%M %p UTC").to_string()
}

fn price(request: &BookingRequest) -> String {
    request
        .price
        .map(|p| format!("${p:.2}"))
        .unwrap_or_else(|| "not specified".to_string())
}

fn booking_summary(booking: &Booking) -> String {
    format!(
        "<ul>\
         <li><strong>Service:</strong> {}</li>\
         <li><strong>When:</strong> {}</li>\
         <li><strong>Zip code:</strong> {}</li>\
         </ul>",
        escape_html(&booking.service_type),
        when(booking),
        escape_html(&booking.zip_code),
    )
}

pub fn otp_email(to: &str, code: &str, purpose: OtpPurpose) -> Email {
    let action = match purpose {
        OtpPurpose::Signup => "finish creating your account",
        OtpPurpose::Login => "sign in",
    };
    let body = format!(
        "<p>Use this code to {action}:</p>\
         <p style=\"font-size: 32px; letter-spacing: 8px; font-weight: bold;\">{code}</p>\
         <p style=\"color: #666;\">The code expires in 10 minutes. If you didn't request it, ignore this email.</p>"
    );
    Email::new("otp", to, "Your verification code", layout("Your verification code", &body))
}

pub fn booking_request_email(
    business: &Business,
    booking: &Booking,
    customer_name: &str,
    request_id: &str,
    public_url: &str,
) -> Email {
    let base = public_url.trim_end_matches('/');
    let accept = format!("{base}/api/business/accept/{request_id}");
    let decline = format!("{base}/api/business/decline/{request_id}");
    let body = format!(
        "<p>Hi {contact},</p>\
         <p>{customer} is looking for a provider:</p>\
         {summary}\
         <p>\
           <a href=\"{accept}\" style=\"background: #16a34a; color: #fff; padding: 10px 20px; text-decoration: none; border-radius: 4px;\">Send a quote</a>\
           &nbsp;\
           <a href=\"{decline}\" style=\"background: #dc2626; color: #fff; padding: 10px 20px; text-decoration: none; border-radius: 4px;\">Decline</a>\
         </p>",
        contact = escape_html(&business.contact_person),
        customer = escape_html(customer_name),
        summary = booking_summary(booking),
    );
    Email::new("booking_request", &business.email, "New booking request", layout("New booking request", &body))
        .booking(&booking.id)
        .request(request_id)
        .business(&business.id)
}

pub fn quote_received_email(
    customer: &User,
    booking: &Booking,
    business: &Business,
    request: &BookingRequest,
    frontend_url: &str,
) -> Email {
    let link = format!("{}/bookings/{}", frontend_url.trim_end_matches('/'), booking.id);
    let notes = request
        .notes
        .as_deref()
        .map(|n| format!("<p><em>{}</em></p>", escape_html(n)))
        .unwrap_or_default();
    let body = format!(
        "<p>Hi {name},</p>\
         <p><strong>{business}</strong> sent a quote of <strong>{price}</strong> for your booking:</p>\
         {summary}{notes}\
         <p><a href=\"{link}\">Review your quotes</a></p>",
        name = escape_html(&customer.full_name),
        business = escape_html(&business.name),
        price = price(request),
        summary = booking_summary(booking),
    );
    Email::new("quote_received", &customer.email, "You received a quote", layout("New quote", &body))
        .booking(&booking.id)
        .request(&request.id)
        .business(&business.id)
}

pub fn booking_confirmed_customer_email(
    customer: &User,
    booking: &Booking,
    business: &Business,
    request: &BookingRequest,
) -> Email {
    let body = format!(
        "<p>Hi {name},</p>\
         <p>Your booking with <strong>{business}</strong> is confirmed at <strong>{price}</strong>.</p>\
         {summary}\
         <p>Contact: {contact}, {phone}</p>",
        name = escape_html(&customer.full_name),
        business = escape_html(&business.name),
        price = price(request),
        summary = booking_summary(booking),
        contact = escape_html(&business.contact_person),
        phone = escape_html(&business.phone),
    );
    Email::new("booking_confirmed", &customer.email, "Your booking is confirmed", layout("Booking confirmed", &body))
        .booking(&booking.id)
        .request(&request.id)
}

pub fn booking_confirmed_business_email(
    business: &Business,
    booking: &Booking,
    customer: &User,
    request: &BookingRequest,
    message: Option<&str>,
) -> Email {
    let message = message
        .filter(|m| !m.trim().is_empty())
        .map(|m| format!("<p>Message from the customer: <em>{}</em></p>", escape_html(m)))
        .unwrap_or_default();
    let body = format!(
        "<p>Hi {contact},</p>\
         <p>{customer} accepted your quote of <strong>{price}</strong>.</p>\
         {summary}{message}\
         <p>Customer contact: {email}{phone}</p>",
        contact = escape_html(&business.contact_person),
        customer = escape_html(&customer.full_name),
        price = price(request),
        summary = booking_summary(booking),
        email = escape_html(&customer.email),
        phone = customer
            .phone
            .as_deref()
            .map(|p| format!(", {}", escape_html(p)))
            .unwrap_or_default(),
    );
    Email::new("quote_confirmed", &business.email, "Your quote was accepted", layout("Quote accepted", &body))
        .booking(&booking.id)
        .request(&request.id)
        .business(&business.id)
}

pub fn quote_rejected_email(
    business: &Business,
    booking: &Booking,
    request: &BookingRequest,
    reason: Option<&str>,
) -> Email {
    let reason = reason
        .filter(|r| !r.trim().is_empty())
        .map(|r| format!("<p>Reason: <em>{}</em></p>", escape_html(r)))
        .unwrap_or_default();
    let body = format!(
        "<p>Hi {contact},</p>\
         <p>The customer declined your quote of {price} for:</p>\
         {summary}{reason}",
        contact = escape_html(&business.contact_person),
        price = price(request),
        summary = booking_summary(booking),
    );
    Email::new("quote_rejected", &business.email, "Your quote was declined", layout("Quote declined", &body))
        .booking(&booking.id)
        .request(&request.id)
        .business(&business.id)
}

pub fn quote_not_selected_email(business: &Business, booking: &Booking, request_id: &str) -> Email {
    let body = format!(
        "<p>Hi {contact},</p>\
         <p>The customer chose another provider for this booking. Thanks for your quote.</p>\
         {summary}",
        contact = escape_html(&business.contact_person),
        summary = booking_summary(booking),
    );
    Email::new("quote_not_selected", &business.email, "Booking filled by another provider", layout("Booking filled", &body))
        .booking(&booking.id)
        .request(request_id)
        .business(&business.id)
}

pub fn booking_cancelled_business_email(business: &Business, booking: &Booking, request_id: &str) -> Email {
    let body = format!(
        "<p>Hi {contact},</p>\
         <p>The customer cancelled this booking request:</p>\
         {summary}",
        contact = escape_html(&business.contact_person),
        summary = booking_summary(booking),
    );
    Email::new("booking_cancelled", &business.email, "Booking cancelled", layout("Booking cancelled", &body))
        .booking(&booking.id)
        .request(request_id)
        .business(&business.id)
}

pub fn no_business_available_email(customer: &User, booking: &Booking) -> Email {
    let body = format!(
        "<p>Hi {name},</p>\
         <p>Unfortunately no business is available for your booking:</p>\
         {summary}\
         <p>Please try a different time.</p>",
        name = escape_html(&customer.full_name),
        summary = booking_summary(booking),
    );
    Email::new("no_business_available", &customer.email, "No provider available", layout("No provider available", &body))
        .booking(&booking.id)
}
